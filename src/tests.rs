// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Store-level scenario tests

#[cfg(test)]
mod tests {
    #![allow(clippy::module_inception)]
    use crate::{ArchetypeId, EcsError, Entity, Result, Term, Terms, World};

    fn query(world: &mut World, terms: &[Term]) -> Result<crate::QueryId> {
        world.register_query(Terms::new(terms.iter().copied())?)
    }

    #[test]
    fn test_liveness_across_kill_and_reuse() -> Result<()> {
        let mut world = World::new();
        let e = world.new_entity()?;
        assert!(world.is_alive(e));

        world.kill(e)?;
        assert!(!world.is_alive(e));

        let reused = world.new_entity()?;
        assert_eq!(reused.index(), e.index());
        assert!(reused.generation() > e.generation());
        assert!(world.is_alive(reused));
        assert!(!world.is_alive(e));
        Ok(())
    }

    #[test]
    fn test_killed_component_index_registers_again() -> Result<()> {
        let mut world = World::new();
        let old = world.new_component(4)?;
        world.kill(old)?;

        let reused = world.new_component(8)?;
        assert_eq!(reused.index(), old.index());
        assert_eq!(world.components().column_size(reused)?, 8);
        assert!(!world.components().is_registered(old));

        let e = world.new_entity()?;
        world.set_as(e, reused, &7u64)?;
        assert_eq!(*world.get_as::<u64>(e, reused)?, 7);
        Ok(())
    }

    #[test]
    fn test_unregistered_entity_on_reused_index_is_rejected() -> Result<()> {
        let mut world = World::new();
        let old = world.new_component(4)?;
        let carrier = world.new_entity()?;
        let e = world.new_entity()?;
        world.add(carrier, old)?;

        world.kill(old)?;
        let plain = world.new_entity()?;
        assert_eq!(plain.index(), old.index());

        assert_eq!(
            world.add(e, plain),
            Err(EcsError::ComponentNotRegistered(plain))
        );
        assert!(!world.has(e, plain));
        assert!(!world.has(e, old));
        assert_eq!(
            world.entity_location(e).map(|location| location.archetype_id),
            Some(ArchetypeId::EMPTY)
        );
        Ok(())
    }

    #[test]
    fn test_stale_edge_is_not_followed_for_reused_index() -> Result<()> {
        let mut world = World::new();
        let old = world.new_component(4)?;
        let other = world.new_component(2)?;
        let carrier = world.new_entity()?;
        world.set_as(carrier, old, &0xABCD_u32)?;

        world.kill(old)?;
        let reused = world.new_component(8)?;
        assert_eq!(reused.index(), old.index());

        // The empty archetype's edge for this index still points at {old}
        let e = world.new_entity()?;
        world.add(e, reused)?;
        assert!(world.has(e, reused));
        assert!(!world.has(e, old));

        // The carrier keeps the dead component and can still migrate
        world.add(carrier, other)?;
        assert!(world.has(carrier, old));
        assert_eq!(*world.get_as::<u32>(carrier, old)?, 0xABCD);
        world.remove(carrier, old)?;
        assert!(!world.has(carrier, old));
        assert!(world.has(carrier, other));
        Ok(())
    }

    #[test]
    fn test_add_remove_round_trip() -> Result<()> {
        let mut world = World::new();
        let c = world.new_component(4)?;
        let e = world.new_entity()?;

        world.add(e, c)?;
        assert!(world.has(e, c));
        world.remove(e, c)?;
        assert!(!world.has(e, c));
        world.add(e, c)?;
        assert!(world.has(e, c));
        Ok(())
    }

    #[test]
    fn test_add_twice_and_remove_absent_are_noops() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let b = world.new_component(4)?;
        let e = world.new_entity()?;

        world.set_as(e, a, &11u32)?;
        let before = world.entity_location(e);
        world.add(e, a)?;
        assert_eq!(world.entity_location(e), before);
        assert_eq!(*world.get_as::<u32>(e, a)?, 11);

        world.remove(e, b)?;
        assert_eq!(world.entity_location(e), before);
        Ok(())
    }

    #[test]
    fn test_set_get_round_trip_for_all_sizes() -> Result<()> {
        let mut world = World::new();
        let e = world.new_entity()?;
        let patterns: [&[u8]; 5] = [
            &[0xA5],
            &[0x12, 0x34],
            &[1, 2, 3, 4],
            &[8, 7, 6, 5, 4, 3, 2, 1],
            &[9; 24],
        ];

        let mut components = Vec::new();
        for bytes in patterns {
            let c = world.new_component(bytes.len())?;
            world.set(e, c, bytes)?;
            components.push(c);
        }
        for (c, bytes) in components.iter().zip(patterns) {
            assert_eq!(world.get(e, *c)?, bytes);
        }
        Ok(())
    }

    #[test]
    fn test_composition_is_order_independent() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let b = world.new_component(8)?;
        let e1 = world.new_entity()?;
        let e2 = world.new_entity()?;

        world.add(e1, a)?;
        world.add(e1, b)?;
        world.add(e2, b)?;
        world.add(e2, a)?;

        let first = world.entity_location(e1).map(|loc| loc.archetype_id);
        let second = world.entity_location(e2).map(|loc| loc.archetype_id);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_negated_term_stops_matching_on_add() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let b = world.new_tag()?;
        let q = query(&mut world, &[Term::with(a), Term::without(b)])?;

        let e = world.new_entity()?;
        world.add(e, a)?;
        let seen: Vec<Entity> = world
            .iter(q)?
            .flat_map(|run| run.entities().to_vec())
            .collect();
        assert_eq!(seen, vec![e]);

        world.add(e, b)?;
        assert_eq!(world.iter(q)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_position_velocity_cache_scenario() -> Result<()> {
        let mut world = World::new();
        let position = world.new_component(8)?;
        let velocity = world.new_component(8)?;

        let positions = query(&mut world, &[Term::with(position)])?;
        assert!(world.query_archetypes(positions)?.is_empty());

        let e1 = world.new_entity()?;
        world.add(e1, position)?;
        assert_eq!(world.query_archetypes(positions)?.len(), 1);
        let run = world.iter(positions)?.next().map(|run| run.entities().to_vec());
        assert_eq!(run, Some(vec![e1]));

        let e2 = world.new_entity()?;
        world.add(e2, position)?;
        assert_eq!(world.query_archetypes(positions)?.len(), 1);
        assert_eq!(
            world.entity_location(e1).map(|loc| loc.archetype_id),
            world.entity_location(e2).map(|loc| loc.archetype_id)
        );

        world.add(e1, velocity)?;
        assert_eq!(world.query_archetypes(positions)?.len(), 2);
        let total: usize = world.iter(positions)?.map(|run| run.len()).sum();
        assert_eq!(total, 2);

        let moving = query(&mut world, &[Term::with(position), Term::with(velocity)])?;
        assert_eq!(world.query_archetypes(moving)?.len(), 1);
        let runs: Vec<Vec<Entity>> = world
            .iter(moving)?
            .map(|run| run.entities().to_vec())
            .collect();
        assert_eq!(runs, vec![vec![e1]]);
        Ok(())
    }

    #[test]
    fn test_removing_last_component_returns_to_empty_archetype() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let b = world.new_tag()?;
        let e = world.new_entity()?;

        world.add(e, a)?;
        world.add(e, b)?;
        world.remove(e, a)?;
        world.remove(e, b)?;

        let location = world.entity_location(e).map(|loc| loc.archetype_id);
        assert_eq!(location, Some(ArchetypeId::EMPTY));
        assert!(!world.has(e, a));
        assert!(!world.has(e, b));
        Ok(())
    }

    #[test]
    fn test_swap_removal_keeps_other_rows_intact() -> Result<()> {
        let mut world = World::new();
        let c = world.new_component(4)?;
        let e1 = world.new_entity()?;
        let e2 = world.new_entity()?;
        let e3 = world.new_entity()?;
        world.set_as(e1, c, &1u32)?;
        world.set_as(e2, c, &2u32)?;
        world.set_as(e3, c, &3u32)?;

        world.kill(e2)?;

        assert_eq!(*world.get_as::<u32>(e1, c)?, 1);
        assert_eq!(*world.get_as::<u32>(e3, c)?, 3);
        assert_eq!(world.entity_location(e3).map(|loc| loc.archetype_row), Some(1));
        Ok(())
    }

    #[test]
    fn test_migration_preserves_existing_values() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let b = world.new_component(2)?;
        let c = world.new_component(8)?;
        let e = world.new_entity()?;

        world.set_as(e, a, &0xDEAD_BEEFu32)?;
        world.set_as(e, c, &u64::MAX)?;
        // First traversal of each edge, then cached traversals
        for _ in 0..2 {
            world.set_as(e, b, &0x1234u16)?;
            world.remove(e, b)?;
        }
        world.add(e, b)?;

        assert_eq!(*world.get_as::<u32>(e, a)?, 0xDEAD_BEEF);
        assert_eq!(*world.get_as::<u16>(e, b)?, 0);
        assert_eq!(*world.get_as::<u64>(e, c)?, u64::MAX);
        Ok(())
    }

    #[test]
    fn test_missing_component_is_an_error() -> Result<()> {
        let mut world = World::new();
        let c = world.new_component(4)?;
        let e = world.new_entity()?;
        assert_eq!(
            world.get(e, c),
            Err(EcsError::ComponentNotFound {
                entity: e,
                component: c
            })
        );
        Ok(())
    }

    #[test]
    fn test_tags_occupy_a_slot_without_data() -> Result<()> {
        let mut world = World::new();
        let tag = world.new_tag()?;
        let e = world.new_entity()?;
        world.add(e, tag)?;

        assert!(world.has(e, tag));
        assert!(world.get(e, tag)?.is_empty());
        let archetype = world
            .entity_location(e)
            .and_then(|loc| world.archetype(loc.archetype_id))
            .map(|archetype| archetype.composition().to_vec());
        assert_eq!(archetype, Some(vec![tag]));
        Ok(())
    }

    #[test]
    fn test_iter_mut_writes_columns() -> Result<()> {
        let mut world = World::new();
        let position = world.component::<[f32; 2]>()?;

        let speed = world.new_component(4)?;
        let mut entities = Vec::new();
        for n in 0..4 {
            let e = world.new_entity()?;
            world.set_as(e, position, &[n as f32, 0.0])?;
            if n % 2 == 0 {
                world.set_as(e, speed, &2.0f32)?;
            }
            entities.push(e);
        }

        let q = query(&mut world, &[Term::with(position), Term::with(speed)])?;
        for mut run in world.iter_mut(q)? {
            let (positions, speeds) = run.column_pair_as_mut::<[f32; 2], f32>(position, speed)?;
            for (p, s) in positions.iter_mut().zip(speeds.iter()) {
                p[1] += *s;
            }
        }

        assert_eq!(world.get_as::<[f32; 2]>(entities[0], position)?, &[0.0, 2.0]);
        assert_eq!(world.get_as::<[f32; 2]>(entities[1], position)?, &[1.0, 0.0]);
        assert_eq!(world.get_as::<[f32; 2]>(entities[2], position)?, &[2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_adhoc_query_sees_current_archetypes() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let e = world.new_entity()?;
        world.set_as(e, a, &5u32)?;

        let terms = Terms::new([Term::with(a)])?;
        let values: Vec<u32> = world
            .query(&terms)?
            .map(|run| run.column_as::<u32>(a).map(|col| col.to_vec()))
            .collect::<Result<Vec<_>>>()?
            .concat();
        assert_eq!(values, vec![5]);
        assert_eq!(world.query_cache_stats().num_cached_queries, 0);
        Ok(())
    }

    #[test]
    fn test_empty_archetypes_are_skipped() -> Result<()> {
        let mut world = World::new();
        let a = world.new_component(4)?;
        let q = query(&mut world, &[Term::with(a)])?;
        let e = world.new_entity()?;
        world.add(e, a)?;
        world.remove(e, a)?;

        assert_eq!(world.query_archetypes(q)?.len(), 1);
        assert_eq!(world.iter(q)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_singletons() -> Result<()> {
        #[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        #[repr(C)]
        struct Gravity {
            y: f32,
        }

        let mut world = World::new();
        assert!(world.singleton::<Gravity>().is_none());
        let gravity = world.set_singleton(Gravity { y: -9.8 })?;
        assert_eq!(world.singleton::<Gravity>(), Some(&Gravity { y: -9.8 }));

        let mass = world.new_component(4)?;
        let e = world.new_entity()?;
        world.set_as(e, mass, &2.0f32)?;

        let q = query(&mut world, &[Term::with(mass), Term::singleton(gravity)])?;
        let mut runs = 0;
        for run in world.iter(q)? {
            assert_eq!(run.singleton_as::<Gravity>(gravity)?.y, -9.8);
            runs += 1;
        }
        assert_eq!(runs, 1);
        Ok(())
    }

    #[test]
    fn test_independent_worlds() -> Result<()> {
        let mut first = World::new();
        let mut second = World::new();
        let a = first.component::<u32>()?;
        second.new_entity()?;
        let b = second.component::<u32>()?;

        assert_ne!(a, b);
        assert_eq!(first.component_id::<u32>(), Some(a));
        assert_eq!(second.component_id::<u32>(), Some(b));
        Ok(())
    }
}
