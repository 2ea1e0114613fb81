use archetype_store::prelude::*;
use archetype_store::{Archetype, ArchetypeId};

fn terms(list: &[Term]) -> Terms {
    Terms::new(list.iter().copied()).unwrap()
}

#[test]
fn test_query_cache_basic() {
    let mut world = World::new();
    let position = world.component::<[f32; 2]>().unwrap();
    let velocity = world.component::<[f32; 3]>().unwrap();

    for i in 0..100 {
        let e = world.new_entity().unwrap();
        world.set_as(e, position, &[i as f32, 0.0]).unwrap();
        world.set_as(e, velocity, &[1.0f32, 1.0, 1.0]).unwrap();
    }

    let q = world
        .register_query(terms(&[Term::with(position), Term::with(velocity)]))
        .unwrap();
    let count: usize = world.iter(q).unwrap().map(|run| run.len()).sum();
    assert_eq!(count, 100);

    let stats = world.query_cache_stats();
    assert_eq!(stats.num_cached_queries, 1);
    assert_eq!(stats.total_cached_archetypes, 1);
}

#[test]
fn test_query_cache_incremental_update() {
    let mut world = World::new();
    let a = world.new_component(4).unwrap();
    let b = world.new_component(4).unwrap();
    let c = world.new_tag().unwrap();
    let q = world.register_query(terms(&[Term::with(a)])).unwrap();

    let e = world.new_entity().unwrap();
    world.add(e, a).unwrap();
    world.add(e, b).unwrap();
    world.add(e, c).unwrap();
    world.remove(e, b).unwrap();

    // {a}, {a,b}, {a,b,c}, {a,c}
    let cached = world.query_archetypes(q).unwrap().to_vec();
    assert_eq!(cached.len(), 4);
    assert!(cached.windows(2).all(|w| w[0] < w[1]));

    let full_scan: Vec<ArchetypeId> = world
        .archetypes()
        .iter()
        .filter(|archetype| archetype.has_component(a))
        .map(Archetype::id)
        .collect();
    assert_eq!(cached, full_scan);
}

#[test]
fn test_late_registration_matches_full_scan() {
    let mut world = World::new();
    let components: Vec<Entity> = (0..5).map(|_| world.new_component(4).unwrap()).collect();

    // Every subset of the first four components gets an archetype
    for mask in 1u32..16 {
        let e = world.new_entity().unwrap();
        for (bit, &component) in components.iter().take(4).enumerate() {
            if mask & (1 << bit) != 0 {
                world.add(e, component).unwrap();
            }
        }
    }

    let shapes = [
        terms(&[Term::with(components[0])]),
        terms(&[Term::with(components[0]), Term::with(components[3])]),
        terms(&[Term::with(components[1]), Term::without(components[2])]),
        terms(&[Term::without(components[0])]),
        terms(&[Term::with(components[4])]),
        Terms::default(),
    ];
    for shape in shapes {
        let q = world.register_query(shape.clone()).unwrap();
        let expected: Vec<ArchetypeId> = world
            .archetypes()
            .iter()
            .filter(|archetype| shape.matches(archetype.composition()))
            .map(Archetype::id)
            .collect();
        assert_eq!(world.query_archetypes(q).unwrap(), expected.as_slice());
    }
}

#[test]
fn test_nine_terms_rejected() {
    let mut world = World::new();
    let list: Vec<Term> = (0..9)
        .map(|_| Term::with(world.new_tag().unwrap()))
        .collect();
    assert_eq!(Terms::new(list), Err(EcsError::TooManyTerms(9)));
}

#[test]
fn test_terms_from_json_register() {
    let mut world = World::new();
    let a = world.new_component(4).unwrap();
    let b = world.new_tag().unwrap();
    let json = format!(
        r#"[{{"id": {}}}, {{"id": {}, "op": "negate"}}]"#,
        a.to_bits(),
        b.to_bits()
    );
    let parsed = Terms::from_json(&json).unwrap();
    let q = world.register_query(parsed).unwrap();
    let same = world
        .register_query(terms(&[Term::with(a), Term::without(b)]))
        .unwrap();
    assert_eq!(q, same);
}

#[test]
fn test_iteration_skips_other_archetypes() {
    let mut world = World::new();
    let health = world.component::<i32>().unwrap();
    let armor = world.new_tag().unwrap();

    let mut expected = 0;
    for i in 0..10 {
        let e = world.new_entity().unwrap();
        world.set_as(e, health, &i).unwrap();
        if i % 3 == 0 {
            world.add(e, armor).unwrap();
        } else {
            expected += i;
        }
    }

    let q = world
        .register_query(terms(&[Term::with(health), Term::without(armor)]))
        .unwrap();
    let total: i32 = world
        .iter(q)
        .unwrap()
        .map(|run| run.column_as::<i32>(health).unwrap().iter().sum::<i32>())
        .sum();
    assert_eq!(total, expected);
}

#[test]
fn test_missing_column_in_run() {
    let mut world = World::new();
    let a = world.new_component(4).unwrap();
    let b = world.new_component(4).unwrap();
    let e = world.new_entity().unwrap();
    world.add(e, a).unwrap();

    let q = world.register_query(terms(&[Term::with(a)])).unwrap();
    for run in world.iter(q).unwrap() {
        assert!(matches!(
            run.column(b),
            Err(EcsError::ColumnNotFound { component, .. }) if component == b
        ));
    }
}
