//! Group methods.
use anyhow::Result;
use tonic::Request;

use netauth_models::Capability;
use netauth_models::RuleMode;
use netauth_tree::MetaMode;

use crate::messages::Empty;
use crate::messages::EntityReply;
use crate::messages::GroupReply;
use crate::messages::GroupRequest;
use crate::messages::KvReply;
use crate::messages::KvRequest;
use crate::messages::ListReply;
use crate::messages::MemberRequest;
use crate::messages::MetaRequest;
use crate::messages::RuleRequest;
use crate::messages::SearchRequest;
use crate::parse_meta_mode;
use crate::reply;
use crate::required;
use crate::NetAuthService;
use crate::RpcResult;

impl NetAuthService {
    pub async fn group_create(&self, request: Request<GroupRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupCreate", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            let claims = self.require(&context, &metadata, Capability::CreateGroup)?;
            let group = required(request.group, "group")?;
            self.manager
                .create_group(
                    &context,
                    &group.name,
                    group.display_name.as_deref().unwrap_or_default(),
                    group.managed_by.as_deref().unwrap_or_default(),
                    group.number,
                )
                .await?;
            slog::info!(
                context.logger, "Group created";
                "group" => &group.name,
                "requestor" => &claims.entity_id,
            );
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    /// Update the display name and managing group of a group.
    pub async fn group_update(&self, request: Request<GroupRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupUpdate", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            let group = required(request.group, "group")?;
            self.manager.update_group_meta(&context, &group).await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_info(&self, request: Request<GroupRequest>) -> RpcResult<GroupReply> {
        let context = self.request_context("GroupInfo", &request);
        let request = request.into_inner();
        let result: Result<GroupReply> = async {
            let group = required(request.group, "group")?;
            let group = self.manager.fetch_group(&context, &group.name).await?;
            Ok(GroupReply {
                groups: vec![group],
            })
        }
        .await;
        reply(&context, result)
    }

    /// Read or change the untyped metadata of a group.
    pub async fn group_um(&self, request: Request<MetaRequest>) -> RpcResult<ListReply> {
        let context = self.request_context("GroupUM", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<ListReply> = async {
            let mode = parse_meta_mode(&request.action)?;
            if mode != MetaMode::Read {
                self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            }
            let values = self
                .manager
                .group_um(&context, &request.target, mode, &request.key, &request.value)
                .await?;
            Ok(ListReply { values })
        }
        .await;
        reply(&context, result)
    }

    /// Add, change or drop an expansion rule of a group.
    pub async fn group_update_rules(&self, request: Request<RuleRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupUpdateRules", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            let mode: RuleMode = request.mode.parse()?;
            self.manager
                .modify_group_rule(&context, &request.group, &request.target, mode)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_add_member(&self, request: Request<MemberRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupAddMember", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require_member_manager(&context, &metadata, &request.group)
                .await?;
            self.manager
                .add_entity_to_group(&context, &request.entity, &request.group)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_del_member(&self, request: Request<MemberRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupDelMember", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require_member_manager(&context, &metadata, &request.group)
                .await?;
            self.manager
                .remove_entity_from_group(&context, &request.entity, &request.group)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_destroy(&self, request: Request<GroupRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupDestroy", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            let claims = self.require(&context, &metadata, Capability::DestroyGroup)?;
            let group = required(request.group, "group")?;
            self.manager.destroy_group(&context, &group.name).await?;
            slog::info!(
                context.logger, "Group destroyed";
                "group" => &group.name,
                "requestor" => &claims.entity_id,
            );
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    /// List the effective members of a group, `ALL` lists every entity.
    pub async fn group_members(&self, request: Request<GroupRequest>) -> RpcResult<EntityReply> {
        let context = self.request_context("GroupMembers", &request);
        let request = request.into_inner();
        let result: Result<EntityReply> = async {
            let group = required(request.group, "group")?;
            let entities = self.manager.list_members(&context, &group.name).await?;
            Ok(EntityReply { entities })
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_search(&self, request: Request<SearchRequest>) -> RpcResult<GroupReply> {
        let context = self.request_context("GroupSearch", &request);
        let request = request.into_inner();
        let result = self
            .manager
            .search_groups(&context, &request.expression)
            .await
            .map(|groups| GroupReply { groups });
        reply(&context, result)
    }

    pub async fn group_kv_add(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupKVAdd", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            let record = required(request.record, "record")?;
            self.manager
                .group_kv_add(&context, &request.target, record)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_kv_get(&self, request: Request<KvRequest>) -> RpcResult<KvReply> {
        let context = self.request_context("GroupKVGet", &request);
        let request = request.into_inner();
        let result = self
            .manager
            .group_kv_get(&context, &request.target, &request.key)
            .await
            .map(|records| KvReply { records });
        reply(&context, result)
    }

    pub async fn group_kv_del(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupKVDel", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            self.manager
                .group_kv_del(&context, &request.target, &request.key)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }

    pub async fn group_kv_replace(&self, request: Request<KvRequest>) -> RpcResult<Empty> {
        let context = self.request_context("GroupKVReplace", &request);
        let (metadata, _, request) = request.into_parts();
        let result: Result<Empty> = async {
            self.require(&context, &metadata, Capability::ModifyGroupMeta)?;
            let record = required(request.record, "record")?;
            self.manager
                .group_kv_replace(&context, &request.target, record)
                .await?;
            Ok(Empty {})
        }
        .await;
        reply(&context, result)
    }
}
