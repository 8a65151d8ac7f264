use std::time::Duration;

use bytes::Bytes;
use kameo::{actor::ActorRef, messages, Actor};
use lru_time_cache::LruCache;
use tracing::debug;

use crate::{util::random_token, Error, Result};

pub const VIDEO_MIME_TYPE: &str = "video/mp4";

/// A finished download, held in memory until the browser collects it.
#[derive(Debug, Clone)]
pub struct Transfer {
  pub file_name: String,
  pub mime_type: &'static str,
  pub data: Bytes,
}

#[derive(Actor)]
pub struct TransferStore {
  transfers: LruCache<String, Transfer>,
}

pub struct TransferStoreRef(ActorRef<TransferStore>);

#[messages]
impl TransferStore {
  #[message]
  async fn insert(&mut self, transfer: Transfer) -> Result<String> {
    let token = random_token();
    debug!("holding {} as {token}", transfer.file_name);
    self.transfers.insert(token.clone(), transfer);
    Ok(token)
  }

  // transfers are one-shot: reading one removes it
  #[message]
  async fn take(&mut self, token: String) -> Result<Option<Transfer>> {
    Ok(self.transfers.remove(&token))
  }
}

impl TransferStore {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    let transfers = LruCache::with_expiry_duration_and_capacity(ttl, capacity);
    Self { transfers }
  }

  pub fn spawn(self) -> TransferStoreRef {
    TransferStoreRef(kameo::spawn(self))
  }
}

impl TransferStoreRef {
  pub async fn insert(&self, transfer: Transfer) -> Result<String> {
    self
      .0
      .ask(Insert { transfer })
      .send()
      .await
      .map_err(|_| Error::TransferStore)
  }

  pub async fn take(&self, token: &str) -> Result<Transfer> {
    let token = token.to_string();
    self
      .0
      .ask(Take { token })
      .send()
      .await
      .map_err(|_| Error::TransferStore)?
      .ok_or(Error::TransferNotFound)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn transfer(name: &str) -> Transfer {
    Transfer {
      file_name: name.to_string(),
      mime_type: VIDEO_MIME_TYPE,
      data: Bytes::from_static(b"data"),
    }
  }

  #[tokio::test]
  async fn test_take_once() {
    let store = TransferStore::new(Duration::from_secs(60), 4).spawn();

    let token = store.insert(transfer("a.mp4")).await.unwrap();
    let taken = store.take(&token).await.unwrap();
    assert_eq!(taken.file_name, "a.mp4");
    assert_eq!(taken.data, Bytes::from_static(b"data"));

    assert!(matches!(
      store.take(&token).await,
      Err(Error::TransferNotFound)
    ));
  }

  #[tokio::test]
  async fn test_unknown_token() {
    let store = TransferStore::new(Duration::from_secs(60), 4).spawn();
    assert!(matches!(
      store.take("nope").await,
      Err(Error::TransferNotFound)
    ));
  }

  #[tokio::test]
  async fn test_capacity_evicts_oldest() {
    let store = TransferStore::new(Duration::from_secs(60), 1).spawn();

    let first = store.insert(transfer("a.mp4")).await.unwrap();
    let second = store.insert(transfer("b.mp4")).await.unwrap();

    assert!(store.take(&first).await.is_err());
    assert_eq!(store.take(&second).await.unwrap().file_name, "b.mp4");
  }
}
