//! Scope predicates and the structured device query they are injected into.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Device, DeviceId, DeviceStatus, Role, Tag, TagType};

/// What a principal is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tags", rename_all = "snake_case")]
pub enum ScopeDecision {
    Unrestricted,
    RestrictedToTags(BTreeSet<String>),
    RestrictedToNone,
}

impl ScopeDecision {
    /// Restricted scope over the given location tags; no tags sees nothing.
    pub fn restricted<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            ScopeDecision::RestrictedToNone
        } else {
            ScopeDecision::RestrictedToTags(tags)
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, ScopeDecision::Unrestricted)
    }

    /// The filter a scoped read must carry, if any.
    pub fn predicate(&self) -> Option<DeviceFilter> {
        match self {
            ScopeDecision::Unrestricted => None,
            ScopeDecision::RestrictedToTags(tags) => {
                Some(DeviceFilter::HasLocationTag(tags.clone()))
            }
            ScopeDecision::RestrictedToNone => Some(DeviceFilter::MatchNothing),
        }
    }
}

/// True when any held role lifts the tag restriction.
pub fn has_unrestricted_role(roles: &[Role]) -> bool {
    roles.iter().any(|role| !role.is_restricted)
}

/// One conjunct of a device read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    Ids(BTreeSet<DeviceId>),
    Status(DeviceStatus),
    /// Device carries at least one of these tags, of type location.
    HasLocationTag(BTreeSet<String>),
    MatchNothing,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device, tags: &[Tag]) -> bool {
        match self {
            DeviceFilter::Ids(ids) => ids.contains(&device.id),
            DeviceFilter::Status(status) => device.status == *status,
            DeviceFilter::HasLocationTag(names) => tags
                .iter()
                .any(|tag| tag.tag_type == TagType::Location && names.contains(&tag.name)),
            DeviceFilter::MatchNothing => false,
        }
    }

    fn render(&self, params: &mut Vec<SqlParam>) -> String {
        match self {
            DeviceFilter::Ids(ids) if ids.is_empty() => "1 = 0".to_string(),
            DeviceFilter::Ids(ids) => {
                params.extend(ids.iter().map(|id| SqlParam::Int(*id)));
                format!("ed.id IN ({})", placeholders(ids.len()))
            }
            DeviceFilter::Status(status) => {
                params.push(SqlParam::Text(status.to_string()));
                "ed.status = ?".to_string()
            }
            DeviceFilter::HasLocationTag(names) if names.is_empty() => "1 = 0".to_string(),
            DeviceFilter::HasLocationTag(names) => {
                params.extend(names.iter().cloned().map(SqlParam::Text));
                params.push(SqlParam::Text(TagType::Location.as_str().to_string()));
                format!("tg.name IN ({}) AND tg.type = ?", placeholders(names.len()))
            }
            DeviceFilter::MatchNothing => "1 = 0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrder {
    #[default]
    Id,
    Name,
}

impl DeviceOrder {
    fn column(&self) -> &'static str {
        match self {
            DeviceOrder::Id => "ed.id",
            DeviceOrder::Name => "ed.name",
        }
    }
}

/// A device read with explicit clause structure.
///
/// Filters are always conjunctive and always precede the ordering, so adding
/// a scope predicate never depends on the shape of the existing query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceQuery {
    filters: Vec<DeviceFilter>,
    order_by: Option<DeviceOrder>,
}

impl DeviceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: DeviceFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: DeviceOrder) -> Self {
        self.order_by = Some(order);
        self
    }

    /// AND the scope predicate into this query.
    pub fn scoped(self, decision: &ScopeDecision) -> Self {
        match decision.predicate() {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    pub fn filters(&self) -> &[DeviceFilter] {
        &self.filters
    }

    pub fn ordering(&self) -> Option<DeviceOrder> {
        self.order_by
    }

    /// Statically known to return no rows.
    pub fn matches_nothing(&self) -> bool {
        self.filters.iter().any(|f| match f {
            DeviceFilter::MatchNothing => true,
            DeviceFilter::Ids(ids) => ids.is_empty(),
            DeviceFilter::HasLocationTag(names) => names.is_empty(),
            DeviceFilter::Status(_) => false,
        })
    }

    pub fn matches(&self, device: &Device, tags: &[Tag]) -> bool {
        self.filters.iter().all(|f| f.matches(device, tags))
    }

    /// Render the trailing `WHERE … ORDER BY …` part of a SQL read.
    ///
    /// Column aliases follow the device listing join: `ed` for devices and
    /// `tg` for tags.
    pub fn render_sql(&self) -> SqlFragment {
        let mut params = Vec::new();
        let conditions: Vec<String> = self
            .filters
            .iter()
            .map(|f| f.render(&mut params))
            .collect();

        let mut sql = String::new();
        if !conditions.is_empty() {
            sql.push_str("WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if let Some(order) = self.order_by {
            if !sql.is_empty() {
                sql.push(' ');
            }
            sql.push_str("ORDER BY ");
            sql.push_str(order.column());
        }

        SqlFragment { sql, params }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
