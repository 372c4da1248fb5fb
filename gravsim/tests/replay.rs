// Own test binary: resetting the id counter would race with the other test files.

use gravsim::simulation::constants::*;
use gravsim::{reset_body_id_counter, BodyId, BodyParams, Engine, IntegratorType, NVec3, Parameters, PhysicsMode, Simulation};

fn build() -> Simulation {
    let mut sim = Simulation::new(Engine::new(IntegratorType::Rk4, PhysicsMode::Newtonian), Parameters::default());
    sim.add_body(BodyParams::star().name("Sun").build().unwrap()).unwrap();
    sim.add_body(
        BodyParams::planet()
            .name("Earth")
            .at(NVec3::new(AU, 0.0, 0.0))
            .moving(NVec3::new(0.0, (G * SOLAR_MASS / AU).sqrt(), 0.0))
            .build()
            .unwrap(),
    )
    .unwrap();
    sim
}

#[test]
fn reset_id_counter_replays_identically() {
    reset_body_id_counter(1);
    let mut first = build();
    first.step(24).unwrap();

    reset_body_id_counter(1);
    let mut second = build();
    second.step(24).unwrap();

    let ids: Vec<BodyId> = second.bodies().iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![BodyId(1), BodyId(2)]);
    assert_eq!(first.state_hash(), second.state_hash());

    reset_body_id_counter(100);
    assert_eq!(BodyParams::moon().build().unwrap().id, BodyId(100));
}
