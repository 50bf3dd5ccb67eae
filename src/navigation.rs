use anyhow::{Context, Result};
use tokio::sync::mpsc::Sender;

use crate::events::EngineCommand;
use crate::rotation::Navigation;

/// Keys the display reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Other,
}

impl Key {
    /// `ArrowRight` steps forward, `ArrowLeft` back; everything else is ignored.
    pub fn navigation(self) -> Option<Navigation> {
        match self {
            Key::ArrowRight => Some(Navigation::Next),
            Key::ArrowLeft => Some(Navigation::Previous),
            Key::Other => None,
        }
    }
}

impl EngineCommand {
    /// The navigation this command requests, if it is one.
    pub fn navigation(self) -> Option<Navigation> {
        match self {
            EngineCommand::Next => Some(Navigation::Next),
            EngineCommand::Previous => Some(Navigation::Previous),
            EngineCommand::JumpTo(idx) => Some(Navigation::JumpTo(idx)),
            EngineCommand::Key(key) => key.navigation(),
            EngineCommand::Pause | EngineCommand::Resume | EngineCommand::Refresh => None,
        }
    }
}

/// Manual control over a running engine.
///
/// Every request goes through the engine's mailbox, the same path its own
/// timer ticks are serialized on; the navigator never touches state itself.
#[derive(Debug, Clone)]
pub struct Navigator {
    tx: Sender<EngineCommand>,
}

impl Navigator {
    pub fn new(tx: Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    pub async fn next(&self) -> Result<()> {
        self.send(EngineCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send(EngineCommand::Previous).await
    }

    /// Out-of-range indices are accepted here and ignored by the engine.
    pub async fn jump_to(&self, index: usize) -> Result<()> {
        self.send(EngineCommand::JumpTo(index)).await
    }

    pub async fn key(&self, key: Key) -> Result<()> {
        self.send(EngineCommand::Key(key)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(EngineCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(EngineCommand::Resume).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(EngineCommand::Refresh).await
    }

    pub async fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .context("engine mailbox closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn arrow_keys_map_to_steps() {
        assert_eq!(Key::ArrowRight.navigation(), Some(Navigation::Next));
        assert_eq!(Key::ArrowLeft.navigation(), Some(Navigation::Previous));
        assert_eq!(Key::Other.navigation(), None);
        assert_eq!(
            EngineCommand::Key(Key::ArrowLeft).navigation(),
            Some(Navigation::Previous)
        );
        assert_eq!(EngineCommand::Pause.navigation(), None);
    }

    #[tokio::test]
    async fn navigator_forwards_to_mailbox() {
        let (tx, mut rx) = mpsc::channel(4);
        let nav = Navigator::new(tx);
        nav.jump_to(7).await.unwrap();
        nav.key(Key::ArrowRight).await.unwrap();
        assert_eq!(rx.recv().await, Some(EngineCommand::JumpTo(7)));
        assert_eq!(rx.recv().await, Some(EngineCommand::Key(Key::ArrowRight)));

        drop(rx);
        assert!(nav.next().await.is_err());
    }
}
