use crate::api::client::ApiClient;
use crate::api::types::{counts_of, ApiCharacter};
use crate::core::error::ClientError;
use crate::models::character::{Character, CharacterId};
use crate::models::user::User;
use crate::stores::storage::{keys, Storage, StorageExt};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a user's characters can come from, in the order they are tried
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Full character objects embedded in the session payload
    Embedded,
    /// `character_ids` from the session payload, or the cached IDs when the
    /// payload has none, fetched one by one
    ById,
    /// A dedicated "my characters" endpoint
    Endpoint,
    /// The list cached by the last successful resolution
    Cached,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::Embedded,
        Strategy::ById,
        Strategy::Endpoint,
        Strategy::Cached,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Embedded => "embedded",
            Strategy::ById => "by-id",
            Strategy::Endpoint => "endpoint",
            Strategy::Cached => "cached",
        };
        f.write_str(name)
    }
}

/// Result of a single strategy
#[derive(Debug)]
pub enum Attempt {
    Found {
        characters: Vec<Character>,
        counts: HashMap<CharacterId, u32>,
    },
    Empty,
    Failed(ClientError),
}

impl Attempt {
    fn from_api(characters: Vec<ApiCharacter>) -> Self {
        if characters.is_empty() {
            return Attempt::Empty;
        }
        let counts = counts_of(&characters);
        Attempt::Found {
            characters: characters.into_iter().map(Character::from).collect(),
            counts,
        }
    }

    fn from_list(characters: Vec<Character>) -> Self {
        if characters.is_empty() {
            Attempt::Empty
        } else {
            Attempt::Found {
                characters,
                counts: HashMap::new(),
            }
        }
    }
}

/// The characters a user may chat with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub characters: Vec<Character>,
    /// Server counts that came along with the character payloads
    pub counts: HashMap<CharacterId, u32>,
    pub source: Strategy,
}

impl Resolved {
    pub fn ids(&self) -> Vec<CharacterId> {
        self.characters.iter().map(|c| c.id).collect()
    }
}

pub struct CharacterResolver {
    api: Arc<ApiClient>,
    storage: Arc<dyn Storage>,
    endpoint_paths: Vec<String>,
}

impl CharacterResolver {
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn Storage>, endpoint_paths: Vec<String>) -> Self {
        Self {
            api,
            storage,
            endpoint_paths,
        }
    }

    /// Walk the strategies in order and keep the first non-empty list
    pub async fn resolve(&self, user: &User) -> Result<Resolved, ClientError> {
        for strategy in Strategy::ORDER {
            match self.attempt(strategy, user).await {
                Attempt::Found { characters, counts } => {
                    info!(
                        user_id = user.id,
                        strategy = %strategy,
                        characters = characters.len(),
                        "Resolved assigned characters"
                    );
                    if strategy != Strategy::Cached {
                        self.cache(&characters);
                    }
                    return Ok(Resolved {
                        characters,
                        counts,
                        source: strategy,
                    });
                }
                Attempt::Empty => {
                    debug!(strategy = %strategy, "Strategy yielded no characters");
                }
                Attempt::Failed(e) => {
                    warn!(strategy = %strategy, error = %e, "Strategy failed");
                }
            }
        }

        warn!(user_id = user.id, "No characters assigned");
        Err(ClientError::NoCharactersAssigned)
    }

    pub async fn attempt(&self, strategy: Strategy, user: &User) -> Attempt {
        match strategy {
            Strategy::Embedded => Attempt::from_list(user.characters.clone()),
            Strategy::ById if user.character_ids.is_empty() => self.fetch_by_ids(&self.cached_ids()).await,
            Strategy::ById => self.fetch_by_ids(&user.character_ids).await,
            Strategy::Endpoint => self.fetch_from_endpoints().await,
            Strategy::Cached => Attempt::from_list(self.cached()),
        }
    }

    /// Fetch every ID in parallel. Individual failures are dropped.
    async fn fetch_by_ids(&self, ids: &[CharacterId]) -> Attempt {
        if ids.is_empty() {
            return Attempt::Empty;
        }

        let results = join_all(ids.iter().map(|id| self.api.character(*id))).await;

        let mut characters = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(character) => characters.push(character),
                Err(e) => {
                    warn!(character_id = id, error = %e, "Failed to fetch character, dropping");
                }
            }
        }

        Attempt::from_api(characters)
    }

    async fn fetch_from_endpoints(&self) -> Attempt {
        let mut last_error = None;

        for path in &self.endpoint_paths {
            debug!(path = %path, "Trying character endpoint");
            match self.api.characters_at(path).await {
                Ok(characters) if !characters.is_empty() => return Attempt::from_api(characters),
                Ok(_) => {
                    debug!(path = %path, "Character endpoint returned an empty list");
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "Character endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Attempt::Failed(e),
            None => Attempt::Empty,
        }
    }

    pub fn cached(&self) -> Vec<Character> {
        self.storage
            .get_json(keys::ASSIGNED_CHARACTERS)
            .unwrap_or_default()
    }

    fn cached_ids(&self) -> Vec<CharacterId> {
        self.storage
            .get_json(keys::ASSIGNED_CHARACTER_IDS)
            .unwrap_or_default()
    }

    fn cache(&self, characters: &[Character]) {
        if let Err(e) = self.storage.set_json(keys::ASSIGNED_CHARACTERS, characters) {
            warn!(error = %e, "Failed to cache assigned characters");
        }
    }
}

/// Keep `previous` when it is still assigned, otherwise take the first
pub fn pick_selection(characters: &[Character], previous: Option<CharacterId>) -> Option<CharacterId> {
    previous
        .filter(|id| characters.iter().any(|c| c.id == *id))
        .or_else(|| characters.first().map(|c| c.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::storage::MemoryStorage;
    use crate::test_support::MockBackend;
    use std::time::Duration;

    async fn resolver_for(backend: &MockBackend, email: &str, password: &str) -> (CharacterResolver, User, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let api = Arc::new(ApiClient::new(&backend.base_url, Duration::from_secs(5), storage.clone()).unwrap());

        let login = api.login(email, password).await.unwrap();
        storage.set(keys::TOKEN, &login.access_token).unwrap();
        let user = User::from(api.me().await.unwrap());

        let paths = vec![
            "/characters/my-characters".to_string(),
            "/characters/my".to_string(),
            "/characters".to_string(),
        ];
        (CharacterResolver::new(api, storage.clone(), paths), user, storage)
    }

    #[tokio::test]
    async fn test_embedded_characters_win() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[1, 2])
            .embed_characters()
            .spawn()
            .await;
        let (resolver, user, storage) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.source, Strategy::Embedded);
        assert_eq!(resolved.ids(), vec![1, 2]);
        assert!(storage.get(keys::ASSIGNED_CHARACTERS).is_some());
        assert!(!backend.hits().iter().any(|h| h.starts_with("GET /characters")));
    }

    #[tokio::test]
    async fn test_falls_back_to_ids() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[7, 8])
            .spawn()
            .await;
        let (resolver, user, _) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;
        assert!(user.characters.is_empty());

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.source, Strategy::ById);
        assert_eq!(resolved.ids(), vec![7, 8]);
        assert_eq!(pick_selection(&resolved.characters, None), Some(7));
    }

    #[tokio::test]
    async fn test_partial_id_failures_are_dropped() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[7, 8])
            .failing_character(7)
            .spawn()
            .await;
        let (resolver, user, _) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.ids(), vec![8]);
    }

    #[tokio::test]
    async fn test_endpoint_variants_tried_in_order() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[2, 3])
            .count(2, 5)
            .failing_character(2)
            .failing_character(3)
            .my_characters_path("/characters/my")
            .spawn()
            .await;
        let (resolver, user, _) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.source, Strategy::Endpoint);
        assert_eq!(resolved.ids(), vec![2, 3]);
        assert_eq!(resolved.counts.get(&2), Some(&5));

        let hits = backend.hits();
        let first = hits.iter().position(|h| h == "GET /characters/my-characters").unwrap();
        let second = hits.iter().position(|h| h == "GET /characters/my").unwrap();
        assert!(first < second);
        assert!(!hits.contains(&"GET /characters".to_string()));
    }

    #[tokio::test]
    async fn test_cached_ids_used_when_payload_has_none() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[])
            .hide_catalog()
            .spawn()
            .await;
        let (resolver, user, storage) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;
        storage.set_json(keys::ASSIGNED_CHARACTER_IDS, &vec![7, 8]).unwrap();

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.source, Strategy::ById);
        assert_eq!(resolved.ids(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_falls_back_to_cache() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[])
            .hide_catalog()
            .spawn()
            .await;
        let (resolver, user, storage) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;
        storage
            .set_json(keys::ASSIGNED_CHARACTERS, &vec![Character::new(4, "Cached")])
            .unwrap();

        let resolved = resolver.resolve(&user).await.unwrap();
        assert_eq!(resolved.source, Strategy::Cached);
        assert_eq!(resolved.ids(), vec![4]);
    }

    #[tokio::test]
    async fn test_nothing_assigned() {
        let backend = MockBackend::builder()
            .user("ana@example.com", "sunny-day1", &[])
            .hide_catalog()
            .spawn()
            .await;
        let (resolver, user, _) = resolver_for(&backend, "ana@example.com", "sunny-day1").await;

        let err = resolver.resolve(&user).await.unwrap_err();
        assert!(matches!(err, ClientError::NoCharactersAssigned));
    }

    #[test]
    fn test_pick_selection_preserves_previous() {
        let characters = vec![Character::new(1, "A"), Character::new(2, "B")];
        assert_eq!(pick_selection(&characters, Some(2)), Some(2));
        assert_eq!(pick_selection(&characters, Some(9)), Some(1));
        assert_eq!(pick_selection(&characters, None), Some(1));
        assert_eq!(pick_selection(&[], Some(1)), None);
    }
}
