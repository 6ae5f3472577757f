// Public modules
pub mod types;
pub mod config;
pub mod error;
pub mod logging;
pub mod parsing;
pub mod aws;
pub mod validate;
pub mod collector;
pub mod cost;
pub mod report;
pub mod slack;
pub mod email;
pub mod notify;
pub mod audit;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, ConfigOrigin, EnvironmentProvider, FileEnvironment, LayeredEnvironment, MockEnvironment, SystemEnvironment};
pub use error::{AuditError, CollectError, NotifyError, ParseError, ProviderError, ReportError};
pub use parsing::{parse_caller_identity, parse_cost_response, parse_identifier_list};
pub use aws::{AwsCli, CloudProvider, MockProvider, KNOWN_REGIONS};
pub use validate::{check_credentials, check_dependencies};
pub use collector::{degrade_to_empty, ResourceCollector};
pub use cost::CostEstimator;
pub use report::{AuditReport, ReportPaths, ReportSummary};
pub use slack::{build_slack_payload, send_to_slack};
pub use notify::{channel_states, ChannelState, ChannelStates, DeliveryOutcome, NotificationMessage, Notifier};
pub use audit::{build_request, parse_services, AuditOutcome, AuditRun, Auditor, CallPlan};
