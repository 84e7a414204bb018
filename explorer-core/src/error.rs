use thiserror::Error;

pub type Result<T, E = StoreError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("malformed store response: {0}")]
    Malformed(String),
    #[error("mutation rejected by store: {0}")]
    Mutation(String),
}

impl From<etcd_client::Error> for StoreError {
    fn from(value: etcd_client::Error) -> Self {
        StoreError::Transport(value.to_string())
    }
}
