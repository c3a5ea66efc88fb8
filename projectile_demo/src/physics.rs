//! Overlap tests between projectiles and asteroids

use std::collections::HashSet;

use frame_engine::ecs::EntityRegistry;
use frame_engine::prelude::*;

/// Sphere overlap physics reporting trigger enter/exit pairs
pub struct OverlapPhysics {
    radius: f32,
    touching: HashSet<(EntityId, EntityId)>,
}

impl OverlapPhysics {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            touching: HashSet::new(),
        }
    }

    fn position(registry: &EntityRegistry, entity: EntityId) -> Option<Vec3> {
        registry
            .component::<TransformComponent>(entity)
            .map(TransformComponent::position)
    }
}

impl PhysicsBackend for OverlapPhysics {
    fn step(&mut self, _fixed_delta: f32, registry: &EntityRegistry) -> Vec<ContactEvent> {
        let shots = registry.find_by_tag("projectile");
        let rocks = registry.find_by_tag("asteroid");
        let mut now = HashSet::new();
        let mut contacts = Vec::new();

        for shot in &shots {
            let Some(shot_pos) = Self::position(registry, shot) else {
                continue;
            };
            for rock in &rocks {
                let Some(rock_pos) = Self::position(registry, rock) else {
                    continue;
                };
                if (shot_pos - rock_pos).magnitude() <= self.radius {
                    now.insert((shot, rock));
                    if !self.touching.contains(&(shot, rock)) {
                        contacts.push(ContactEvent::new(ContactKind::TriggerEnter, shot, rock));
                    }
                }
            }
        }
        for &(shot, rock) in self.touching.difference(&now) {
            contacts.push(ContactEvent::new(ContactKind::TriggerExit, shot, rock));
        }
        self.touching = now;
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_reported_once_then_exit() {
        let mut scheduler = SchedulerCore::new(SchedulerConfig::default()).unwrap();
        scheduler.start().unwrap();
        let shot = scheduler
            .spawn(
                EntityBlueprint::new("shot")
                    .with_tag("projectile")
                    .with_component(TransformComponent::default()),
            )
            .unwrap();
        let rock = scheduler
            .spawn(
                EntityBlueprint::new("rock")
                    .with_tag("asteroid")
                    .with_component(TransformComponent::from_position(Vec3::new(0.5, 0.0, 0.0))),
            )
            .unwrap();

        let mut physics = OverlapPhysics::new(1.0);
        let registry = scheduler.world().registry();
        let first = physics.step(0.02, registry);
        assert_eq!(first, vec![ContactEvent::new(ContactKind::TriggerEnter, shot, rock)]);
        assert!(physics.step(0.02, registry).is_empty());

        scheduler
            .world_mut()
            .registry_mut()
            .component_mut::<TransformComponent>(rock)
            .unwrap()
            .set_position(Vec3::new(5.0, 0.0, 0.0));
        let last = physics.step(0.02, scheduler.world().registry());
        assert_eq!(last, vec![ContactEvent::new(ContactKind::TriggerExit, shot, rock)]);
    }
}
