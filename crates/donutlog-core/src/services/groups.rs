use std::sync::Arc;

use rand::Rng;

use crate::backend::{decode, decode_all, maybe_single, Backend};
use crate::error::{Error, Result};
use crate::join_code::{self, MAX_ALLOCATION_ATTEMPTS};
use crate::models::{Group, Membership, NewGroup, Role};
use crate::query::{tables, Query};
use crate::validation;

pub const JOIN_CODE_NOT_FOUND_MESSAGE: &str = "קוד לא נמצא. בדקי שהקלדת נכון.";
pub const ALREADY_MEMBER_MESSAGE: &str = "את כבר חברה במשפחה הזו";

const UNIQUE_VIOLATION: &str = "23505";

/// Family groups and their memberships.
#[derive(Clone)]
pub struct GroupService {
    backend: Arc<dyn Backend>,
}

impl GroupService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The groups `user_id` belongs to, in membership order.
    pub fn user_groups(&self, user_id: &str) -> Result<Vec<Group>> {
        let rows = self
            .backend
            .select(tables::MEMBERS, &Query::new().eq("user_id", user_id))?;
        let memberships: Vec<Membership> = decode_all(rows)?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let ids = memberships.iter().map(|m| m.group_id.as_str());
        let rows = self
            .backend
            .select(tables::GROUPS, &Query::new().is_in("id", ids))?;
        let groups: Vec<Group> = decode_all(rows)?;

        // A membership can outlive its group; skip those.
        Ok(memberships
            .iter()
            .filter_map(|m| groups.iter().find(|g| g.id == m.group_id).cloned())
            .collect())
    }

    /// Create a group and make `user_id` its admin.
    pub fn create_group(&self, name: &str, user_id: &str) -> Result<Group> {
        self.create_group_with_rng(name, user_id, &mut rand::rng())
    }

    pub fn create_group_with_rng<R: Rng + ?Sized>(
        &self,
        name: &str,
        user_id: &str,
        rng: &mut R,
    ) -> Result<Group> {
        validation::group_name(name)?;
        let code = self.allocate_join_code(rng);

        let row = serde_json::to_value(NewGroup {
            name: name.trim(),
            created_by: user_id,
            join_code: &code,
        })?;
        let group: Group = decode(self.backend.insert(tables::GROUPS, row)?)?;

        let membership = serde_json::to_value(Membership {
            group_id: group.id.clone(),
            user_id: user_id.to_string(),
            role: Role::Admin,
        })?;
        self.backend.insert(tables::MEMBERS, membership)?;

        tracing::info!(group_id = %group.id, join_code = %group.join_code, "Created group");
        Ok(group)
    }

    /// Join the group behind a typed join code.
    pub fn join_group(&self, code: &str, user_id: &str) -> Result<Group> {
        validation::join_code(code)?;
        let code = join_code::normalize(code);

        let rows = self
            .backend
            .select(tables::GROUPS, &Query::new().eq("join_code", &code))?;
        let Some(row) = maybe_single(rows)? else {
            return Err(Error::NotFound {
                message: JOIN_CODE_NOT_FOUND_MESSAGE.to_string(),
                source: None,
            });
        };
        let group: Group = decode(row)?;

        let membership = serde_json::to_value(Membership {
            group_id: group.id.clone(),
            user_id: user_id.to_string(),
            role: Role::Member,
        })?;
        match self.backend.insert(tables::MEMBERS, membership) {
            Ok(_) => {}
            Err(err) if err.code() == Some(UNIQUE_VIOLATION) => {
                return Err(Error::Validation {
                    field: Some("join_code".to_string()),
                    message: ALREADY_MEMBER_MESSAGE.to_string(),
                    source: Some(err),
                });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(group_id = %group.id, "Joined group");
        Ok(group)
    }

    pub fn leave_group(&self, group_id: &str, user_id: &str) -> Result<()> {
        let query = Query::new().eq("group_id", group_id).eq("user_id", user_id);
        self.backend.delete(tables::MEMBERS, &query)?;
        tracing::info!(group_id, "Left group");
        Ok(())
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let rows = self
            .backend
            .select(tables::GROUPS, &Query::new().eq("id", group_id))?;
        maybe_single(rows)?.map(decode).transpose()
    }

    pub fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let query = Query::new()
            .columns("group_id")
            .eq("group_id", group_id)
            .eq("user_id", user_id);
        let rows = self.backend.select(tables::MEMBERS, &query)?;
        Ok(maybe_single(rows)?.is_some())
    }

    /// Pick a join code nobody uses yet, as far as the backend can tell.
    ///
    /// Concurrent creators can still race to the same code; after
    /// [`MAX_ALLOCATION_ATTEMPTS`] collisions the last candidate is used.
    fn allocate_join_code<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut code = join_code::generate(rng);
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            if !self.join_code_taken(&code) {
                break;
            }
            tracing::debug!(join_code = %code, "Join code taken, regenerating");
            code = join_code::generate(rng);
        }
        code
    }

    /// A failed probe counts as free.
    fn join_code_taken(&self, code: &str) -> bool {
        let query = Query::new().columns("id").eq("join_code", code);
        match self
            .backend
            .select(tables::GROUPS, &query)
            .and_then(maybe_single)
        {
            Ok(found) => found.is_some(),
            Err(err) => {
                tracing::warn!("Join code probe failed: {}", err);
                false
            }
        }
    }
}
