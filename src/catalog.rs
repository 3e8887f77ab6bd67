use std::collections::HashMap;

use crate::model::*;
use crate::remote::{EntityProvider, RemoteError};

/// A room type together with the rate plans that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTypeGroup {
    pub room_type: RoomType,
    /// Sorted by `position`.
    pub rate_plans: Vec<RatePlan>,
}

/// Group rate plans under their room types.
///
/// Groups come out in room type `position` order and plans inside a group in
/// their own `position` order. Both sorts are stable. Plans whose room type is
/// not present are left out.
pub fn group(room_types: &[RoomType], rate_plans: &[RatePlan]) -> Vec<RoomTypeGroup> {
    let mut groups: Vec<RoomTypeGroup> = room_types
        .iter()
        .map(|rt| RoomTypeGroup {
            room_type: rt.clone(),
            rate_plans: Vec::new(),
        })
        .collect();
    groups.sort_by_key(|g| g.room_type.position);

    let index: HashMap<EntityId, usize> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| (g.room_type.id, i))
        .collect();

    for plan in rate_plans {
        if let Some(&i) = index.get(&plan.room_type_id) {
            groups[i].rate_plans.push(plan.clone());
        }
    }
    for g in &mut groups {
        g.rate_plans.sort_by_key(|p| p.position);
    }
    groups
}

/// Read-only lookup over the tenant's sellable entities.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<RoomTypeGroup>,
    /// Local id → (group index, plan index within group). Room types use `None`.
    by_id: HashMap<EntityId, (usize, Option<usize>)>,
    room_type_by_external: HashMap<String, EntityId>,
    rate_plan_by_external: HashMap<String, EntityId>,
}

impl Catalog {
    pub fn new(room_types: &[RoomType], rate_plans: &[RatePlan]) -> Self {
        let groups = group(room_types, rate_plans);
        let mut by_id = HashMap::new();
        let mut room_type_by_external = HashMap::new();
        let mut rate_plan_by_external = HashMap::new();

        for (gi, g) in groups.iter().enumerate() {
            by_id.insert(g.room_type.id, (gi, None));
            if let Some(ext) = &g.room_type.external_id {
                room_type_by_external.insert(ext.clone(), g.room_type.id);
            }
            for (pi, plan) in g.rate_plans.iter().enumerate() {
                by_id.insert(plan.id, (gi, Some(pi)));
                if let Some(ext) = &plan.external_id {
                    rate_plan_by_external.insert(ext.clone(), plan.id);
                }
            }
        }

        Self {
            groups,
            by_id,
            room_type_by_external,
            rate_plan_by_external,
        }
    }

    pub async fn from_provider(provider: &dyn EntityProvider) -> Result<Self, RemoteError> {
        let (room_types, rate_plans) = provider.entities().await?;
        Ok(Self::new(&room_types, &rate_plans))
    }

    pub fn groups(&self) -> &[RoomTypeGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn room_type(&self, id: &EntityId) -> Option<&RoomType> {
        match self.by_id.get(id)? {
            (gi, None) => Some(&self.groups[*gi].room_type),
            _ => None,
        }
    }

    pub fn rate_plan(&self, id: &EntityId) -> Option<&RatePlan> {
        match self.by_id.get(id)? {
            (gi, Some(pi)) => Some(&self.groups[*gi].rate_plans[*pi]),
            _ => None,
        }
    }

    /// Rate plans of a room type in position order; empty for unknown ids.
    pub fn rate_plans_of(&self, room_type_id: &EntityId) -> &[RatePlan] {
        match self.by_id.get(room_type_id) {
            Some((gi, None)) => &self.groups[*gi].rate_plans,
            _ => &[],
        }
    }

    pub fn room_types(&self) -> impl Iterator<Item = &RoomType> {
        self.groups.iter().map(|g| &g.room_type)
    }

    pub fn rate_plans(&self) -> impl Iterator<Item = &RatePlan> {
        self.groups.iter().flat_map(|g| g.rate_plans.iter())
    }

    pub fn room_type_for_external(&self, external_id: &str) -> Option<EntityId> {
        self.room_type_by_external.get(external_id).copied()
    }

    pub fn rate_plan_for_external(&self, external_id: &str) -> Option<EntityId> {
        self.rate_plan_by_external.get(external_id).copied()
    }

    /// Resolve a local id to the kind of entity it names.
    pub fn target(&self, id: &EntityId) -> Option<Target> {
        match self.by_id.get(id)? {
            (_, None) => Some(Target::RoomType(*id)),
            (_, Some(_)) => Some(Target::RatePlan(*id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn room(position: u32, ext: Option<&str>) -> RoomType {
        RoomType {
            id: Ulid::new(),
            external_id: ext.map(str::to_string),
            name: format!("room {position}"),
            position,
        }
    }

    fn plan(room_type_id: EntityId, position: u32, ext: Option<&str>) -> RatePlan {
        RatePlan {
            id: Ulid::new(),
            external_id: ext.map(str::to_string),
            name: format!("plan {position}"),
            room_type_id,
            position,
        }
    }

    #[test]
    fn group_empty_input() {
        assert!(group(&[], &[]).is_empty());
    }

    #[test]
    fn group_orders_by_position() {
        let suite = room(2, None);
        let double = room(1, None);
        let p_late = plan(double.id, 5, None);
        let p_early = plan(double.id, 0, None);
        let p_suite = plan(suite.id, 0, None);

        let groups = group(
            &[suite.clone(), double.clone()],
            &[p_late.clone(), p_suite.clone(), p_early.clone()],
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].room_type.id, double.id);
        assert_eq!(groups[0].rate_plans, vec![p_early, p_late]);
        assert_eq!(groups[1].rate_plans, vec![p_suite]);
    }

    #[test]
    fn group_excludes_orphans() {
        let double = room(0, None);
        let orphan = plan(Ulid::new(), 0, None);
        let groups = group(&[double], &[orphan]);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].rate_plans.is_empty());
    }

    #[test]
    fn group_equal_positions_keep_input_order() {
        let double = room(0, None);
        let a = plan(double.id, 1, None);
        let b = plan(double.id, 1, None);
        let groups = group(&[double], &[a.clone(), b.clone()]);
        assert_eq!(groups[0].rate_plans, vec![a, b]);
    }

    #[test]
    fn catalog_lookups() {
        let double = room(0, Some("rt_1"));
        let bar = plan(double.id, 0, Some("rp_1"));
        let nonref = plan(double.id, 1, None);
        let catalog = Catalog::new(&[double.clone()], &[nonref.clone(), bar.clone()]);

        assert_eq!(catalog.room_type(&double.id), Some(&double));
        assert_eq!(catalog.rate_plan(&bar.id), Some(&bar));
        assert_eq!(catalog.room_type(&bar.id), None);
        assert_eq!(catalog.rate_plan(&double.id), None);
        assert_eq!(catalog.rate_plans_of(&double.id), &[bar.clone(), nonref.clone()]);
        assert!(catalog.rate_plans_of(&bar.id).is_empty());
        assert_eq!(catalog.room_type_for_external("rt_1"), Some(double.id));
        assert_eq!(catalog.rate_plan_for_external("rp_1"), Some(bar.id));
        assert_eq!(catalog.rate_plan_for_external("rp_2"), None);
        assert_eq!(catalog.target(&double.id), Some(Target::RoomType(double.id)));
        assert_eq!(catalog.target(&nonref.id), Some(Target::RatePlan(nonref.id)));
        assert_eq!(catalog.target(&Ulid::new()), None);
        assert_eq!(catalog.rate_plans().count(), 2);
    }
}
