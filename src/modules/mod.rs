pub mod censor;
pub mod client_gate;
pub mod external;
pub mod github;
pub mod mailer;
pub mod network;
pub mod redirect_rules;
pub mod stats;
pub mod storage;
