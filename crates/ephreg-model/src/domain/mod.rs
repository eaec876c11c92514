mod env;
pub use env::{Env, KeyValue};

mod labels;
pub use labels::Labels;

mod mount;
pub use mount::{Mount, TlsMounts};

mod refs;
pub use refs::{ConfigRef, SecretRef};

mod credentials;
pub use credentials::{Credentials, verify_htpasswd};

mod names;
pub use names::RunNames;

pub mod constants;
