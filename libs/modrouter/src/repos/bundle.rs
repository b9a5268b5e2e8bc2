//! Statically typed repository sets, one per module schema.

use std::sync::Arc;

use super::executor::QueryExecutor;
use super::repository::Repository;
use crate::error::RouterError;
use crate::module_key::ModuleKey;

/// A typed repository set that can be borrowed out of a [`RepositoryBundle`].
pub trait ModuleRepos: Sized {
    const SCHEMA: ModuleKey;

    fn from_set(set: &RepositorySet) -> Option<&Self>;
}

macro_rules! repository_set {
    (
        $(#[$meta:meta])*
        $name:ident => $schema:ident {
            $($field:ident : $table:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            $(pub $field: Repository,)+
        }

        impl $name {
            fn bind(module: ModuleKey, executor: &Arc<dyn QueryExecutor>) -> Self {
                Self {
                    $($field: Repository::new(
                        module,
                        stringify!($field),
                        $table,
                        Arc::clone(executor),
                    ),)+
                }
            }

            pub fn all(&self) -> Vec<&Repository> {
                vec![$(&self.$field),+]
            }
        }

        impl ModuleRepos for $name {
            const SCHEMA: ModuleKey = ModuleKey::$schema;

            fn from_set(set: &RepositorySet) -> Option<&Self> {
                match set {
                    RepositorySet::$schema(repos) => Some(repos),
                    _ => None,
                }
            }
        }
    };
}

repository_set! {
    /// Users, churches, people and the permission graph.
    MembershipRepos => Membership {
        users: "users",
        churches: "churches",
        user_churches: "userChurches",
        people: "people",
        households: "households",
        groups: "groups",
        group_members: "groupMembers",
        roles: "roles",
        role_members: "roleMembers",
        role_permissions: "rolePermissions",
        settings: "settings",
        access_logs: "accessLogs",
    }
}

repository_set! {
    AttendanceRepos => Attendance {
        campuses: "campuses",
        services: "services",
        service_times: "serviceTimes",
        group_service_times: "groupServiceTimes",
        sessions: "sessions",
        visits: "visits",
        visit_sessions: "visitSessions",
    }
}

repository_set! {
    ContentRepos => Content {
        pages: "pages",
        sections: "sections",
        elements: "elements",
        blocks: "blocks",
        links: "links",
        files: "files",
        sermons: "sermons",
        playlists: "playlists",
        streaming_services: "streamingServices",
        settings: "settings",
    }
}

repository_set! {
    GivingRepos => Giving {
        donations: "donations",
        donation_batches: "donationBatches",
        funds: "funds",
        fund_donations: "fundDonations",
        gateways: "gateways",
        customers: "customers",
        subscriptions: "subscriptions",
        event_logs: "eventLogs",
    }
}

repository_set! {
    /// Conversations plus the notification queue the timers drain.
    MessagingRepos => Messaging {
        connections: "connections",
        conversations: "conversations",
        messages: "messages",
        private_messages: "privateMessages",
        notifications: "notifications",
        notification_preferences: "notificationPreferences",
        devices: "devices",
        delivery_logs: "deliveryLogs",
        blocked_ips: "blockedIps",
    }
}

repository_set! {
    /// Automations, tasks and service planning.
    DoingRepos => Doing {
        actions: "actions",
        automations: "automations",
        conditions: "conditions",
        conjunctions: "conjunctions",
        tasks: "tasks",
        plans: "plans",
        plan_items: "planItems",
        positions: "positions",
        assignments: "assignments",
        times: "times",
        blockout_dates: "blockoutDates",
    }
}

repository_set! {
    ReportingRepos => Reporting {
        reports: "reports",
        report_runs: "reportRuns",
    }
}

/// The tagged repository set carried by a bundle.
#[derive(Debug, Clone)]
pub enum RepositorySet {
    Membership(MembershipRepos),
    Attendance(AttendanceRepos),
    Content(ContentRepos),
    Giving(GivingRepos),
    Messaging(MessagingRepos),
    Doing(DoingRepos),
    Reporting(ReportingRepos),
}

impl RepositorySet {
    pub fn schema(&self) -> ModuleKey {
        match self {
            RepositorySet::Membership(_) => ModuleKey::Membership,
            RepositorySet::Attendance(_) => ModuleKey::Attendance,
            RepositorySet::Content(_) => ModuleKey::Content,
            RepositorySet::Giving(_) => ModuleKey::Giving,
            RepositorySet::Messaging(_) => ModuleKey::Messaging,
            RepositorySet::Doing(_) => ModuleKey::Doing,
            RepositorySet::Reporting(_) => ModuleKey::Reporting,
        }
    }

    pub fn repositories(&self) -> Vec<&Repository> {
        match self {
            RepositorySet::Membership(r) => r.all(),
            RepositorySet::Attendance(r) => r.all(),
            RepositorySet::Content(r) => r.all(),
            RepositorySet::Giving(r) => r.all(),
            RepositorySet::Messaging(r) => r.all(),
            RepositorySet::Doing(r) => r.all(),
            RepositorySet::Reporting(r) => r.all(),
        }
    }
}

/// Every data-access object of one module, bound to that module's connection.
///
/// Built at most once per module per process and shared read-only afterwards.
pub struct RepositoryBundle {
    module: ModuleKey,
    executor: Arc<dyn QueryExecutor>,
    set: RepositorySet,
}

impl std::fmt::Debug for RepositoryBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryBundle")
            .field("module", &self.module)
            .field("schema", &self.set.schema())
            .field("descriptor", &self.executor.descriptor().redacted())
            .finish()
    }
}

impl RepositoryBundle {
    /// Wire the repository set for `module`'s schema onto `executor`.
    pub fn bind(module: ModuleKey, executor: Arc<dyn QueryExecutor>) -> Self {
        let set = match module.schema() {
            ModuleKey::Membership | ModuleKey::MembershipForDoing => {
                RepositorySet::Membership(MembershipRepos::bind(module, &executor))
            }
            ModuleKey::Attendance => {
                RepositorySet::Attendance(AttendanceRepos::bind(module, &executor))
            }
            ModuleKey::Content => RepositorySet::Content(ContentRepos::bind(module, &executor)),
            ModuleKey::Giving => RepositorySet::Giving(GivingRepos::bind(module, &executor)),
            ModuleKey::Messaging => {
                RepositorySet::Messaging(MessagingRepos::bind(module, &executor))
            }
            ModuleKey::Doing => RepositorySet::Doing(DoingRepos::bind(module, &executor)),
            ModuleKey::Reporting => {
                RepositorySet::Reporting(ReportingRepos::bind(module, &executor))
            }
        };
        Self {
            module,
            executor,
            set,
        }
    }

    pub fn module(&self) -> ModuleKey {
        self.module
    }

    pub fn set(&self) -> &RepositorySet {
        &self.set
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// Borrow the typed repository set, e.g. `bundle.repos::<MessagingRepos>()`.
    pub fn repos<R: ModuleRepos>(&self) -> Result<&R, RouterError> {
        R::from_set(&self.set).ok_or(RouterError::SchemaMismatch {
            module: self.module,
            expected: R::SCHEMA,
            actual: self.set.schema(),
        })
    }

    /// Round-trip a trivial statement to check connectivity.
    pub async fn ping(&self) -> Result<(), RouterError> {
        self.executor
            .fetch_i64("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|source| RouterError::Query {
                module: self.module,
                source,
            })
    }
}
