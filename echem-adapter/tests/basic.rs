use echem_adapter::{EchemAdapter, EchemCommand, EchemContext};
use queue_core::DeviceAdapter;

#[test]
fn execute_before_connect_fails() {
    let adapter = EchemAdapter;
    let mut ctx = EchemContext::default();
    let result = adapter.execute(&mut ctx, &EchemCommand::ReadOpenCircuitVoltage);
    assert!(result.is_err());
}

#[test]
fn open_circuit_voltage_reads_near_zero() {
    let adapter = EchemAdapter;
    let mut ctx = EchemContext::default();
    adapter
        .connect(&mut ctx, &echem_adapter::EchemConnectParams::default())
        .unwrap();

    let output = adapter
        .execute(&mut ctx, &EchemCommand::ReadOpenCircuitVoltage)
        .unwrap();
    let voltage = output.open_circuit_voltage.expect("expected a voltage reading");
    assert!((0.0..0.1).contains(&voltage));
}

#[test]
fn chronoamperometry_produces_a_decaying_current_trace() {
    let adapter = EchemAdapter;
    let mut ctx = EchemContext::default();
    adapter
        .connect(&mut ctx, &echem_adapter::EchemConnectParams::default())
        .unwrap();

    let output = adapter
        .execute(
            &mut ctx,
            &EchemCommand::RunChronoamperometry {
                potential_v: 0.5,
                duration_s: 2.0,
                on_progress: None,
            },
        )
        .unwrap();

    assert!(!output.points.is_empty());
    let first_current = output.points.first().unwrap().1;
    let last_current = output.points.last().unwrap().1;
    assert!(last_current < first_current, "Cottrell decay should trend downward");
}

#[test]
fn disconnect_then_execute_fails_again() {
    let adapter = EchemAdapter;
    let mut ctx = EchemContext::default();
    adapter
        .connect(&mut ctx, &echem_adapter::EchemConnectParams::default())
        .unwrap();
    adapter.disconnect(&mut ctx);
    assert!(adapter
        .execute(&mut ctx, &EchemCommand::ReadOpenCircuitVoltage)
        .is_err());
}
