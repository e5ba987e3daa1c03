//! In-process graph store
//!
//! Accounts, dev bindings and characters are nodes of a property graph;
//! a binding points at its account (`BoundTo`) and an account points at its
//! characters (`Owns`). Every mutation runs under one write lock, which makes
//! the account + binding insert atomic and serializes racing duplicates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use tokio::sync::RwLock;

use crate::core::db::models::{
    Account, AccountId, Character, DEFAULT_PRIVILEGE, DevAccount, NewCharacter, Platform,
};
use crate::core::db::repositories::{AccountRepository, CharacterRepository, RepositoryError};

#[derive(Debug, Clone)]
enum GraphNode {
    Account(Account),
    DevBinding {
        dev_id: String,
        created_at: DateTime<Utc>,
    },
    Character(Character),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphEdge {
    BoundTo,
    Owns,
}

#[derive(Default)]
struct GraphState {
    graph: StableGraph<GraphNode, GraphEdge>,
    accounts: HashMap<AccountId, NodeIndex>,
    dev_bindings: HashMap<String, NodeIndex>,
}

impl GraphState {
    fn account(&self, idx: NodeIndex) -> Option<&Account> {
        match self.graph.node_weight(idx) {
            Some(GraphNode::Account(account)) => Some(account),
            _ => None,
        }
    }

    /// Follow a binding's `BoundTo` edge to its account
    fn bound_account(&self, binding: NodeIndex) -> Option<&Account> {
        self.graph
            .neighbors_directed(binding, Direction::Outgoing)
            .find_map(|idx| self.account(idx))
    }
}

/// Graph store for accounts, dev bindings and characters
#[derive(Clone, Default)]
pub struct GraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl GraphStore {
    /// Create an empty graph store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts and dev bindings currently stored
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.accounts.len(), state.dev_bindings.len())
    }
}

#[async_trait]
impl AccountRepository for GraphStore {
    async fn create_dev_account(
        &self,
        account_id: AccountId,
        dev_id: &str,
    ) -> Result<Account, RepositoryError> {
        let mut state = self.state.write().await;

        // Both checks happen before any node is added, so a failure leaves
        // the graph untouched
        if state.dev_bindings.contains_key(dev_id) {
            return Err(RepositoryError::DuplicateDevId);
        }
        if state.accounts.contains_key(&account_id) {
            return Err(RepositoryError::Integrity(format!(
                "account id {} already exists",
                account_id
            )));
        }

        let now = Utc::now();
        let account = Account {
            id: account_id,
            platform: Platform::Dev,
            platform_id: 0,
            privilege: DEFAULT_PRIVILEGE.to_string(),
            created_at: now,
        };

        let account_idx = state.graph.add_node(GraphNode::Account(account.clone()));
        let binding_idx = state.graph.add_node(GraphNode::DevBinding {
            dev_id: dev_id.to_string(),
            created_at: now,
        });
        state
            .graph
            .add_edge(binding_idx, account_idx, GraphEdge::BoundTo);
        state.accounts.insert(account_id, account_idx);
        state.dev_bindings.insert(dev_id.to_string(), binding_idx);

        Ok(account)
    }

    async fn find_by_dev_id(&self, dev_id: &str) -> Result<Option<DevAccount>, RepositoryError> {
        let state = self.state.read().await;

        let Some(&binding_idx) = state.dev_bindings.get(dev_id) else {
            return Ok(None);
        };

        let created_at = match state.graph.node_weight(binding_idx) {
            Some(GraphNode::DevBinding { created_at, .. }) => *created_at,
            _ => {
                return Err(RepositoryError::Integrity(format!(
                    "dev binding {} is not a binding node",
                    dev_id
                )));
            }
        };

        let account = state.bound_account(binding_idx).ok_or_else(|| {
            RepositoryError::Integrity(format!("dev binding {} has no account", dev_id))
        })?;

        Ok(Some(DevAccount {
            dev_id: dev_id.to_string(),
            account_id: account.id,
            created_at,
        }))
    }

    async fn find_privilege(
        &self,
        account_id: AccountId,
    ) -> Result<Option<String>, RepositoryError> {
        let state = self.state.read().await;

        Ok(state
            .accounts
            .get(&account_id)
            .and_then(|&idx| state.account(idx))
            .map(|account| account.privilege.clone()))
    }
}

#[async_trait]
impl CharacterRepository for GraphStore {
    async fn create_character(
        &self,
        character: &NewCharacter,
    ) -> Result<Character, RepositoryError> {
        let mut state = self.state.write().await;

        let account_idx = *state
            .accounts
            .get(&character.account_id)
            .ok_or(RepositoryError::AccountNotFound)?;

        let created = Character {
            id: character.id,
            account_id: character.account_id,
            name: character.name.clone(),
            race: character.race,
            created_at: Utc::now(),
        };

        let character_idx = state.graph.add_node(GraphNode::Character(created.clone()));
        state
            .graph
            .add_edge(account_idx, character_idx, GraphEdge::Owns);

        Ok(created)
    }

    async fn list_characters(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Character>, RepositoryError> {
        let state = self.state.read().await;

        let Some(&account_idx) = state.accounts.get(&account_id) else {
            return Ok(Vec::new());
        };

        let mut characters: Vec<Character> = state
            .graph
            .neighbors_directed(account_idx, Direction::Outgoing)
            .filter_map(|idx| match state.graph.node_weight(idx) {
                Some(GraphNode::Character(character)) => Some(character.clone()),
                _ => None,
            })
            .collect();

        characters.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(characters)
    }
}
