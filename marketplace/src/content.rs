//! Content repository: static id → content lookup.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use market_wire::{Handler, Message, Opcode, ProtocolError};

use crate::catalog::ContentItem;

/// Immutable after construction.  Later duplicates of an id win.
#[derive(Debug, Default)]
pub struct ContentRepository {
    items: HashMap<i64, String>,
}

impl ContentRepository {
    pub fn new(items: impl IntoIterator<Item = ContentItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id, i.content)).collect(),
        }
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.items.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct ContentHandler {
    repo: ContentRepository,
}

impl ContentHandler {
    pub fn new(repo: ContentRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Handler for ContentHandler {
    fn name(&self) -> &str {
        "Content"
    }

    async fn handle(&mut self, request: Message, _from: SocketAddr) -> Result<Message, ProtocolError> {
        if request.opcode != Opcode::ContentRequest {
            return Err(ProtocolError::UnexpectedOpcode(request.opcode));
        }
        let raw = request.fields().first().copied().unwrap_or_default();
        let id = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ProtocolError::bad_payload(Opcode::ContentRequest, format!("item id {raw:?}")))?;

        match self.repo.get(id) {
            Some(content) => {
                log::debug!("[content] {id} → {content}");
                Ok(Message::new(Opcode::Success, format!("{id}\n{content}")))
            }
            None => {
                log::info!("[content] no content for item {id}");
                Ok(Message::empty(Opcode::Fail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> ContentHandler {
        ContentHandler::new(ContentRepository::new([
            ContentItem { id: 3, content: "movie.mp4".into() },
            ContentItem { id: 4, content: "song.ogg".into() },
        ]))
    }

    #[tokio::test]
    async fn known_id_returns_content() {
        let reply = handler()
            .handle(Message::new(Opcode::ContentRequest, "3"), "127.0.0.1:5000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(reply, Message::new(Opcode::Success, "3\nmovie.mp4"));
    }

    #[tokio::test]
    async fn unknown_id_fails_empty() {
        let reply = handler()
            .handle(Message::new(Opcode::ContentRequest, "99\n"), "127.0.0.1:5000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(reply, Message::empty(Opcode::Fail));
    }

    #[tokio::test]
    async fn garbage_id_is_protocol_error() {
        let err = handler()
            .handle(Message::new(Opcode::ContentRequest, "three"), "127.0.0.1:5000".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::BadPayload { opcode: Opcode::ContentRequest, .. }));
    }

    #[test]
    fn later_duplicate_wins() {
        let repo = ContentRepository::new([
            ContentItem { id: 1, content: "a".into() },
            ContentItem { id: 1, content: "b".into() },
        ]);
        assert_eq!(repo.get(1), Some("b"));
        assert_eq!(repo.len(), 1);
    }
}
