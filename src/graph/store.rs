//! `FlowStore`: the active main flow plus the set of subflow documents it
//! may reference, held as an ECS resource in the `World`.

use super::model::{Flow, FlowId};
use bevy_ecs::prelude::Resource;
use std::collections::HashMap;

#[derive(Resource, Default)]
pub struct FlowStore {
    flows: HashMap<FlowId, Flow>,
    active: Option<FlowId>,
}

impl FlowStore {
    pub fn insert(&mut self, flow: Flow) -> FlowId {
        let id = flow.id;
        self.flows.insert(id, flow);
        id
    }

    pub fn get(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(&id)
    }

    pub fn get_mut(&mut self, id: FlowId) -> Option<&mut Flow> {
        self.flows.get_mut(&id)
    }

    pub fn remove(&mut self, id: FlowId) -> Option<Flow> {
        self.flows.remove(&id)
    }

    pub fn set_active(&mut self, id: FlowId) {
        self.active = Some(id);
    }

    pub fn active_id(&self) -> Option<FlowId> {
        self.active
    }

    pub fn active(&self) -> Option<&Flow> {
        self.active.and_then(|id| self.flows.get(&id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Flow> {
        let id = self.active?;
        self.flows.get_mut(&id)
    }
}
