//! Entity methods.
use anyhow::Result;
use tonic::Request;

use netauth_models::Capability;
use netauth_tree::KeyMode;
use netauth_tree::MetaMode;

use crate::messages::Empty;
use crate::messages::EntityReply;
use crate::messages::EntityRequest;
use crate::messages::GroupsRequest;
use crate::messages::KeysRequest;
use crate::messages::KvReply;
use crate::messages::KvRequest;
use crate::messages::ListReply;
use crate::messages::MetaRequest;
use crate::messages::SearchRequest;
use crate::parse_key_mode;
use crate::parse_meta_mode;
use crate::reply;
use crate::required;
use crate::NetAuthService;
use crate::RpcResult;

impl NetAuthService {
    pub async fn entity_create(&self, request: Request<EntityRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityCreate", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            let claims = self.require(&context, &metadata, Capability::CreateEntity)?;
            let entity = required(request.entity, "entity")?;
            self.manager
                .create_entity(&context, &entity.id, entity.number, &entity.secret)
                .await?;
            slog::info!(
                context.logger, "Entity created";
                "entity" => &entity.id,
                "requestor" => &claims.entity_id,
            );
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    /// Merge the metadata of the request into the entity.
    pub async fn entity_update(&self, request: Request<EntityRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityUpdate", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyEntityMeta)?;
            let entity = required(request.entity, "entity")?;
            let meta = entity.meta.unwrap_or_default();
            self.manager
                .update_entity_meta(&context, &entity.id, meta)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_info(&self, request: Request<EntityRequest>) -> RpcResult<EntityReply> {
        let context = self.request_context("EntityInfo", &request);
        let request = request.into_inner();
        let result: Result<EntityReply> = async {
            let entity = required(request.entity, "entity")?;
            let entity = self.manager.fetch_entity(&context, &entity.id).await?;
            Ok(EntityReply {
                entities: vec![entity],
            })
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_search(&self, request: Request<SearchRequest>) -> RpcResult<EntityReply> {
        let context = self.request_context("EntitySearch", &request);
        let request = request.into_inner();
        let result = self
            .manager
            .search_entities(&context, &request.expression)
            .await
            .map(|entities| EntityReply { entities });
        reply(&context, result)
    }

    pub async fn entity_destroy(&self, request: Request<EntityRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityDestroy", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            let claims = self.require(&context, &metadata, Capability::DestroyEntity)?;
            let entity = required(request.entity, "entity")?;
            self.manager.destroy_entity(&context, &entity.id).await?;
            slog::info!(
                context.logger, "Entity destroyed";
                "entity" => &entity.id,
                "requestor" => &claims.entity_id,
            );
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_lock(&self, request: Request<EntityRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityLock", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::LockEntity)?;
            let entity = required(request.entity, "entity")?;
            self.manager.lock_entity(&context, &entity.id).await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_unlock(&self, request: Request<EntityRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityUnlock", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::UnlockEntity)?;
            let entity = required(request.entity, "entity")?;
            self.manager.unlock_entity(&context, &entity.id).await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    /// List the direct or effective groups of an entity.
    pub async fn entity_groups(&self, request: Request<GroupsRequest>) -> RpcResult<ListReply> {
        let context = self.request_context("EntityGroups", &request);
        let request = request.into_inner();
        let result: Result<ListReply> = async {
            let entity = self.manager.fetch_entity(&context, &request.id).await?;
            let values = self
                .manager
                .get_memberships(&context, &entity, request.indirect)
                .await?;
            Ok(ListReply { values })
        }
        .await;
        reply(&context, result)
    }

    /// Manage the public keys of an entity.
    ///
    /// Entities may manage their own keys without `MODIFY_ENTITY_KEYS`.
    pub async fn entity_keys(&self, request: Request<KeysRequest>) -> RpcResult<ListReply> {
        let context = self.request_context("EntityKeys", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<ListReply> = async {
            let mode = parse_key_mode(&request.action)?;
            if mode != KeyMode::Read {
                let claims = self.caller(&context, &metadata)?;
                if claims.entity_id != request.id {
                    self.require(&context, &metadata, Capability::ModifyEntityKeys)?;
                }
            }
            let values = self
                .manager
                .entity_keys(&context, &request.id, mode, &request.key_type, &request.key)
                .await?;
            Ok(ListReply { values })
        }
        .await;
        reply(&context, result)
    }

    /// Read or change the untyped metadata of an entity.
    pub async fn entity_um(&self, request: Request<MetaRequest>) -> RpcResult<ListReply> {
        let context = self.request_context("EntityUM", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<ListReply> = async {
            let mode = parse_meta_mode(&request.action)?;
            if mode != MetaMode::Read {
                self.require(&context, &metadata, Capability::ModifyEntityMeta)?;
            }
            let values = self
                .manager
                .entity_um(&context, &request.target, mode, &request.key, &request.value)
                .await?;
            Ok(ListReply { values })
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_kv_add(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityKVAdd", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyEntityMeta)?;
            let record = required(request.record, "record")?;
            self.manager
                .entity_kv_add(&context, &request.target, record)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_kv_get(&self, request: Request<KvRequest>) -> RpcResult<KvReply> {
        let context = self.request_context("EntityKVGet", &request);
        let request = request.into_inner();
        let result = self
            .manager
            .entity_kv_get(&context, &request.target, &request.key)
            .await
            .map(|records| KvReply { records });
        reply(&context, result)
    }

    pub async fn entity_kv_del(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityKVDel", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyEntityMeta)?;
            self.manager
                .entity_kv_del(&context, &request.target, &request.key)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn entity_kv_replace(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("EntityKVReplace", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyEntityMeta)?;
            let record = required(request.record, "record")?;
            self.manager
                .entity_kv_replace(&context, &request.target, record)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }
}
