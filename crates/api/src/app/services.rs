use std::sync::Arc;

use serde_json::Value as JsonValue;

use wayfare_infra::schema;
use wayfare_infra::{
    DeleteOutcome, Filter, InMemoryBackend, InMemorySession, InsertOutcome, PostgrestStore, Row,
    RowStore, StoreConfig, StoreError, TripCollaboration, UpdateOutcome,
};

use crate::context::IdentityContext;

/// Store handle scoped to one request's identity.
#[derive(Debug, Clone)]
pub enum RequestStore {
    InMemory(InMemorySession),
    Postgrest(PostgrestStore),
}

#[async_trait::async_trait]
impl RowStore for RequestStore {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        match self {
            RequestStore::InMemory(s) => s.select(table, filter).await,
            RequestStore::Postgrest(s) => s.select(table, filter).await,
        }
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError> {
        match self {
            RequestStore::InMemory(s) => s.insert(table, rows).await,
            RequestStore::Postgrest(s) => s.insert(table, rows).await,
        }
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError> {
        match self {
            RequestStore::InMemory(s) => s.update(table, patch, filter).await,
            RequestStore::Postgrest(s) => s.update(table, patch, filter).await,
        }
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError> {
        match self {
            RequestStore::InMemory(s) => s.delete(table, filter).await,
            RequestStore::Postgrest(s) => s.delete(table, filter).await,
        }
    }

    async fn call_procedure(&self, name: &str, args: JsonValue) -> Result<JsonValue, StoreError> {
        match self {
            RequestStore::InMemory(s) => s.call_procedure(name, args).await,
            RequestStore::Postgrest(s) => s.call_procedure(name, args).await,
        }
    }
}

pub type Collaboration = TripCollaboration<RequestStore, wayfare_auth::StaticIdentity>;

/// Backend wiring shared by all requests.
#[derive(Debug, Clone)]
pub enum AppServices {
    InMemory { backend: Arc<InMemoryBackend> },
    Postgrest { store: PostgrestStore },
}

pub fn build_services(config: &StoreConfig) -> Result<AppServices, StoreError> {
    match &config.postgrest {
        Some(settings) => {
            tracing::info!(url = %settings.url, "using PostgREST store");
            Ok(AppServices::Postgrest {
                store: PostgrestStore::new(settings)?,
            })
        }
        None => {
            tracing::warn!("WAYFARE_STORE_URL not set; using in-memory store (data is lost on restart)");
            let backend = InMemoryBackend::arc();
            schema::provision(&backend);
            Ok(AppServices::InMemory { backend })
        }
    }
}

impl AppServices {
    /// Facade acting as the request's identity.
    pub fn collaboration(&self, identity: &IdentityContext) -> Collaboration {
        let store = match self {
            AppServices::InMemory { backend } => RequestStore::InMemory(backend.as_user(identity.user_id())),
            AppServices::Postgrest { store } => {
                RequestStore::Postgrest(store.with_access_token(identity.access_token()))
            }
        };
        TripCollaboration::new(store, identity.resolver())
    }
}
