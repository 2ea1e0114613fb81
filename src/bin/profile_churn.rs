#![allow(unused_imports)]

use archetype_store::{Entity, Term, Terms, World};
use std::{fs::File, time::Instant};

#[cfg(feature = "profiling")]
fn churn(world: &mut World, components: &[Entity], entities: &[Entity], rounds: usize) {
    let _span = tracing::info_span!("churn_loop", rounds = rounds).entered();
    for round in 0..rounds {
        if round % 10 == 0 {
            tracing::info!("Churn round {}/{}", round, rounds);
        }
        for (n, &e) in entities.iter().enumerate() {
            let component = components[(n + round) % components.len()];
            let result = if world.has(e, component) {
                world.remove(e, component)
            } else {
                world.add(e, component)
            };
            if let Err(err) = result {
                tracing::error!(%err, "churn step failed");
                return;
            }
        }
    }
}

#[cfg(feature = "profiling")]
fn main() -> archetype_store::Result<()> {
    // Set up tracing subscriber to write to a file
    let file = match File::create("trace.log") {
        Ok(file) => file,
        Err(err) => {
            eprintln!("cannot create trace.log: {err}");
            return Ok(());
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut world = World::new();
    let components: Vec<Entity> = (0..8)
        .map(|_| world.new_component(8))
        .collect::<archetype_store::Result<_>>()?;
    for &component in &components {
        world.register_query(Terms::new([Term::with(component)])?)?;
    }

    println!("Creating entities...");
    let entities: Vec<Entity> = (0..10_000)
        .map(|_| world.new_entity())
        .collect::<archetype_store::Result<_>>()?;

    println!("Profiling add/remove churn over 8 components...");
    let start = Instant::now();
    churn(&mut world, &components, &entities, 50);
    println!("Churn complete in: {:?}", start.elapsed());

    let start = Instant::now();
    for e in entities {
        world.kill(e)?;
    }
    println!("Kill 10k entities complete in: {:?}", start.elapsed());
    println!("{:?}", world.query_cache_stats());
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_churn binary requires --features profiling");
}
