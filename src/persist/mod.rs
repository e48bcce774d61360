pub mod store;

pub use store::{
    establish_session, store_from_config, DisabledStore, FileSessionStore, HttpSessionStore,
    PersistError, SessionId, SessionStore,
};
