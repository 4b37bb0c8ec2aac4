//! Closed catalogue of audit event kinds.
//!
//! Each kind has a stable numeric code (declaration order, starting at 1)
//! and an English description. The description is what lands in the
//! `event` field of a serialized record.

use serde::{Serialize, Serializer};

macro_rules! define_events {
    (
        $( $(#[$vmeta:meta])* $variant:ident => $desc:literal ),+ $(,)?
    ) => {
        /// Audit event kind. `Undefined` (code 0) is never written.
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            Undefined = 0,
            $( $(#[$vmeta])* $variant ),+
        }

        impl EventKind {
            /// Every writable kind, in code order.
            pub const ALL: &'static [EventKind] = &[ $( EventKind::$variant ),+ ];

            pub fn description(self) -> &'static str {
                match self {
                    EventKind::Undefined => "",
                    $( EventKind::$variant => $desc ),+
                }
            }
        }
    };
}

define_events! {
    // Service lifecycle
    ServiceStart => "Service start",
    ServiceStop => "Service stop",

    // Users
    UserCreate => "Create user",
    UserProfileEdit => "Edit user profile",
    UserDelete => "Delete user",
    UserPasswordChange => "Change user password",
    UserNameChange => "Change user name",
    UserTokenCreate => "Create user token",
    UserTokenDelete => "Delete user token",
    GpgKeyAdd => "Add GPG key",
    GpgKeyRemove => "Remove GPG key",
    SshKeyAdd => "Add SSH key",
    SshKeyRemove => "Remove SSH key",
    UserHookAdd => "Add user hook",
    UserHookRemove => "Remove user hook",
    UserHookDisable => "Disable user hook",
    UserHookEnable => "Enable user hook",
    UserHookSettingsChange => "Change user hook settings",
    UserAddToProjectTeam => "Add user to project team",
    UserRemoveFromProjectTeam => "Remove user from project team",
    UserAvatarChange => "Change user avatar",
    UserAvatarDelete => "Delete user avatar",
    ProjectAvatarChange => "Change project avatar",
    ProjectAvatarDelete => "Delete project avatar",

    // Rights and permissions
    GlobalRightsGranted => "Granted global rights",
    GlobalRightsRemove => "Remove global rights",
    ProjectTeamRightsGranted => "Granted project team rights to user",
    ProjectTeamRightsChange => "Change project team rights",
    ProjectTeamRightsRemove => "Remove project team rights at user",
    RepositoryRightsGranted => "Granted repository rights",
    RepositoryRightsChange => "Change repository rights",
    RepositoryRightsRemove => "Remove repository rights",
    UserTuzRightsGranted => "Grant user tuz rights",

    // Repository activity
    RepositoryOpen => "Open repository",
    BuildRun => "Run build",
    BranchCreate => "Create branch",
    BranchDelete => "Delete branch",
    ChangesPush => "Push changes",
    RepositoryPullOrClone => "Pull or clone repository",

    // Pull requests
    PrMerge => "Merge pull request",
    PrCreate => "Create pull request",
    PrClose => "Close pull request",
    PrReopen => "Reopen pull request",
    PrDelete => "Delete pull request",

    // Task tracker links
    UnitLinksRequestCreate => "Create unit links request",
    PullRequestLinksAdd => "Send unit binding event to task tracker",
    PullRequestLinksDelete => "Send unit binding removal event to task tracker",
    UnitTaskLock => "Lock unit task",
    UnitTaskUnlock => "Unlock unit task",
    PullRequestsUpdate => "Send an event of updating pull request status",

    // Authentication
    UserLogin => "User login",
    UserLogout => "Logout user",

    // Security
    UnauthorizedRequest => "Unauthorized request",

    // Tenants
    TenantCreate => "Create tenant",
    TenantEdit => "Edit tenant",
    TenantActivate => "Activate tenant",
    TenantDeactivate => "Deactivate tenant",
    TenantDelete => "Delete tenant",

    // Repository settings
    RepositoryCreate => "Create repository",
    RepositoryDelete => "Delete repository",
    RepositoryAdopt => "Adopt repository",
    RepositoryImport => "Import repository",
    RepositoryFork => "Fork repository",
    HookInRepositoryAdd => "Add hook in repository",
    HookInRepositoryRemove => "Remove hook in repository",
    HookInRepositoryDisable => "Disable hook in repository",
    HookInRepositoryEnable => "Enable hook in repository",
    HookSettingsInRepositoryChange => "Change hook settings in repository",
    RepositorySettingsChange => "Change repository settings",
    BranchProtectionAddToRepository => "Branch protection add to repository",
    BranchProtectionDeleteFromRepository => "Branch protection delete from repository",
    BranchProtectionUpdateInRepository => "Branch protection update in repository",
    BranchDeleteAfterMergeSettingEnable => "Enable branch delete after merge setting",
    BranchDeleteAfterMergeSettingDisable => "Disable branch delete after merge setting",
    PrMergeSettingDelete => "Delete pull request merge setting",
    PrMergeSettingUpdate => "Update pull request merge setting",
    ReviewSettingCreate => "Review setting to repository",
    ReviewSettingUpdate => "Review setting update in repository",
    ReviewSettingDelete => "Review setting delete from repository",

    // Projects (organizations)
    ProjectCreate => "Create project",
    ProjectDelete => "Delete project",
    ProjectEdit => "Edit project",
    HookInProjectAdd => "Add hook in project",
    HookInProjectRemove => "Remove hook in project",
    HookInProjectDisable => "Disable hook in project",
    HookInProjectEnable => "Enable hook in project",
    HookSettingsInProjectChange => "Change hook settings in project",
    ProjectSettingsChange => "Change project settings",
    TeamAddToProject => "Add team to project",
    TeamRemoveFromProject => "Remove team from project",
    TeamUpdateInProject => "Update team in project",

    // System hooks
    DefaultOrSystemHookAdd => "Add default or system hook",
    DefaultOrSystemHookRemove => "Remove default or system hook",
    DefaultOrSystemHookDisable => "Disable default or system hook",
    DefaultOrSystemHookEnable => "Enable default or system hook",
    DefaultOrSystemHookSettingsChange => "Change default or system hook settings",
    GitHookAdd => "Add git hook",
    GitHookEdit => "Edit git hook",
    GitHookRemove => "Remove git hook",
    GitHookStart => "Start git hook",
    GitHookFinish => "Finish git hook",

    // Cron tasks
    CronTaskRegistered => "Registered cron task",
    CronTaskRun => "Run cron task",
    CronTaskFinished => "Finish cron task",
    CronTaskCancel => "Cancel cron task",
    CronTaskLock => "Lock cron task",
    CronTaskUnlock => "Unlock cron task",

    // Administration
    AdminDashboardOpen => "Open admin dashboard",
    AdminConfigurationOpen => "Open admin configuration",
    AdminConfigurationChange => "Change admin configuration",
    SystemNoticesOpen => "Open system notices",
    SystemNoticesDelete => "Delete system notices",
    SystemNoticesClear => "Clear system notices",
    AuthenticationSourceManagementOpen => "Open authentication source management",
    AuthenticationSourceAdd => "Add authentication source",
    AuthenticationSourceEdit => "Edit authentication source",
    AuthenticationSourceDelete => "Delete authentication source",
    UserEmailManagementOpen => "Open user email management",
    UserEmailActivate => "Activate user email",
    UserEmailDeactivate => "Deactivate user email",
    UserEmailDelete => "Delete user email",
    ApplicationsSettingsOpen => "Open applications settings",
    ApplicationsSettingsAdd => "Add applications settings",
    ApplicationsSettingsEdit => "Edit applications settings",
    ApplicationsSettingsDelete => "Delete applications settings",
    ApplicationsSettingsGenerateSecret => "Generate secret for application settings",
    MonitoringStacktraceOpen => "Open monitoring stacktrace",
    StacktraceProcessCancel => "Cancel stacktrace process",
    DiagnosisReportDownload => "Download diagnosis report",
    MonitorQueuesPanelOpen => "Open monitor queues panel",
    MonitorQueueOpen => "Open monitor queue",
    QueueNumberOfWorkersChange => "Change number of workers of queue",
    QueueAllItemsRemove => "Remove all items queue",

    // Comments
    CommentDelete => "Delete comment",
    CommentCreateCode => "Create code comment",
    CommentUpdate => "Update comment",

    // Privileges
    PrivilegesRevoke => "Revoke privileges",
    PrivilegesGrant => "Grant privileges to user",

    // Kafka notifications
    CreateRepositorySend => "Send create repository event",

    // Technical accounts
    TuzCreate => "Create tuz",

    // Transport credentials
    MtlsCredsGetFromSecMan => "[READ_SECRET] Read mtls credentials",
    TlsConfigCreatingWithMtls => "Create TLS configuration with the mtls certificates",

    // Code owners
    CodeOwnersSettingsChange => "Change code owners settings",
    CodeOwnersSettingsGrant => "Grant code owners settings",
    CodeOwnersSettingsRevoke => "Revoke code owners settings",
    CodeOwnersSettingsUpdate => "Update code owners settings",
    CodeOwnersAssign => "Assign code owners",
    ReviewerAssign => "Assign reviewers",

    // Secret storage
    SecManReadSecret => "[READ_SECRET] Read secret from secret storage",
    SecManApplySecret => "[APPLYING_SECRET] Update secret or related objects",

    // Metrics marks
    CodeHubMarkSet => "Set code hub mark",
    CodeHubMarkDelete => "Delete code hub mark",
    ExternalMetricCounterSet => "Set external metric counter",
    ExternalMetricCounterDelete => "Delete external metric counter",

    // Custom privileges
    AddCustomPrivileges => "Add custom privileges",
    UpdateCustomPrivileges => "Update custom privileges",
    RemoveCustomPrivileges => "Remove custom privileges",

    // Static analysis settings
    SonarSettingsCreate => "Create sonar settings",
    SonarSettingsUpdate => "Update sonar settings",
    SonarSettingsDelete => "Delete sonar settings",
}

impl EventKind {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_defined(self) -> bool {
        self != EventKind::Undefined
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_dense_and_one_based() {
        for (index, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.code() as usize, index + 1);
        }
        assert_eq!(EventKind::Undefined.code(), 0);
    }

    #[test]
    fn descriptions_are_present_and_unique() {
        let mut seen = HashSet::new();
        for kind in EventKind::ALL {
            assert!(!kind.description().is_empty(), "{kind:?} has no description");
            assert!(seen.insert(kind.description()), "{kind:?} duplicates a description");
        }
    }

    #[test]
    fn serializes_as_description() {
        let json = serde_json::to_string(&EventKind::CronTaskLock).unwrap();
        assert_eq!(json, "\"Lock cron task\"");
    }
}
