//! End-to-end scenarios for the fusion core's public API.

use marg_fusion_core::fusion::FusionPolicy;
use marg_fusion_core::{FusionCore, Q16};

fn bootstrap(core: &mut FusionCore, accel: [Q16; 3], mag: [Q16; 3]) {
    let gyro = [Q16::ZERO, Q16::ZERO, Q16::ZERO];
    core.set_accelerometer(accel);
    core.set_gyroscope(gyro);
    core.set_magnetometer(mag);
    core.update(Q16::from_num(0.01)).unwrap();
    core.set_accelerometer(accel);
    core.set_magnetometer(mag);
    core.update(Q16::from_num(0.01)).unwrap();
    assert!(core.attitude_euler_and_quaternion_ready());
}

// Scenario 1: level, stationary platform reports near-zero roll and pitch.
#[test]
fn level_stationary_platform() {
    let mut core = FusionCore::new();
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    for _ in 0..10 {
        core.set_accelerometer(accel);
        core.set_gyroscope([Q16::ZERO, Q16::ZERO, Q16::ZERO]);
        core.set_magnetometer(mag);
        core.update(Q16::from_num(0.01)).unwrap();
    }

    let angles = core.fetch_angles();
    assert!((angles.roll.to_num::<f32>()).abs() < 0.05);
    assert!((angles.pitch.to_num::<f32>()).abs() < 0.05);
}

// Scenario 2: platform tilted 30 degrees about the body X axis reports
// roughly matching roll, with pitch/yaw close to zero.
#[test]
fn tilted_thirty_degrees_roll() {
    let mut core = FusionCore::new();
    // accel = (0, -sin(30deg), cos(30deg)), per spec.md §8 scenario 2.
    let accel = [Q16::ZERO, Q16::from_num(-0.5), Q16::from_num(0.8660)];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    for _ in 0..10 {
        core.set_accelerometer(accel);
        core.set_gyroscope([Q16::ZERO, Q16::ZERO, Q16::ZERO]);
        core.set_magnetometer(mag);
        core.update(Q16::from_num(0.01)).unwrap();
    }

    let angles = core.fetch_angles();
    let expected_roll = -core::f32::consts::FRAC_PI_6;
    assert!((angles.roll.to_num::<f32>() - expected_roll).abs() < 0.1);
}

// Scenario 3: a sustained pure yaw rate about the down axis accumulates to
// roughly the expected total yaw angle, with roll/pitch undisturbed.
#[test]
fn pure_yaw_rotation_accumulates() {
    let mut core = FusionCore::new();
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    let dt = Q16::from_num(0.01);
    let rate = Q16::from_num(core::f32::consts::FRAC_PI_2); // ~90 deg/s
    for _ in 0..100 {
        core.set_gyroscope([Q16::ZERO, Q16::ZERO, rate]);
        core.update(dt).unwrap();
    }

    let angles = core.fetch_angles();
    assert!((angles.yaw.to_num::<f32>() - core::f32::consts::FRAC_PI_2).abs() < 0.25);
    assert!((angles.roll.to_num::<f32>()).abs() < 0.1);
}

// Scenario 4: a large accelerometer disturbance is rejected in favour of
// gyro-only integration, rather than corrupting the down estimate.
#[test]
fn disturbed_accelerometer_does_not_corrupt_down_row() {
    let mut core = FusionCore::new();
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    let before = core.fetch_angles();

    // Sharp 3g spike along Z: way past the 0.14 disturbance threshold.
    core.set_accelerometer([Q16::ZERO, Q16::ZERO, Q16::from_num(3.0)]);
    core.set_gyroscope([Q16::ZERO, Q16::ZERO, Q16::ZERO]);
    core.update(Q16::from_num(0.01)).unwrap();

    let after = core.fetch_angles();
    assert!((after.roll.to_num::<f32>() - before.roll.to_num::<f32>()).abs() < 0.05);
    assert!((after.pitch.to_num::<f32>() - before.pitch.to_num::<f32>()).abs() < 0.05);
}

// Scenario 5: magnetometer samples arriving before the attitude filter has
// bootstrapped can't bootstrap the orientation filter (no down row to
// project against yet), but the orientation filter still runs its
// gyro-only correction rather than sitting idle.
#[test]
fn magnetometer_before_attitude_ready_runs_gyro_only() {
    let mut core = FusionCore::new();
    core.set_magnetometer([Q16::ONE, Q16::ZERO, Q16::ZERO]);
    core.set_gyroscope([Q16::from_num(0.2), Q16::ZERO, Q16::ZERO]);
    let report = core.update(Q16::from_num(0.01)).unwrap();
    assert!(!core.attitude_euler_and_quaternion_ready());
    assert_eq!(
        report.orientation.unwrap().branch,
        marg_fusion_core::orientation::OrientationBranch::WaitingForAttitude
    );
}

// Scenario 6: the quaternion round-trips back to the same rotation the
// Euler angles describe for a level platform (both represent "identity").
#[test]
fn quaternion_and_euler_agree_for_level_platform() {
    let mut core = FusionCore::new();
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    let angles = core.fetch_angles();
    let quat = core.fetch_quaternion();

    assert!((angles.roll.to_num::<f32>()).abs() < 0.05);
    assert!((angles.pitch.to_num::<f32>()).abs() < 0.05);
    assert!((quat.w.to_num::<f32>() - 1.0).abs() < 0.05);
    let norm_sq = quat.w.to_num::<f32>().powi(2)
        + quat.x.to_num::<f32>().powi(2)
        + quat.y.to_num::<f32>().powi(2)
        + quat.z.to_num::<f32>().powi(2);
    assert!((norm_sq - 1.0).abs() < 0.05);
}

// GyroOnly policy: forces the gyro-only fallback, but only once both
// filters have already bootstrapped — it must not prevent a cold-started
// core from bootstrapping in the first place.
#[test]
fn gyro_only_policy_still_bootstraps_from_cold_start() {
    let mut core = FusionCore::new().with_policy(FusionPolicy::GyroOnly);
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);
    assert!(core.attitude_euler_and_quaternion_ready());
}

// AccelOnly policy: forces the gyroscope contribution to zero before every
// update, matching the original's TEST_ACCEL compile-time branch.
#[test]
fn accel_only_policy_ignores_injected_gyro_rate() {
    let mut core = FusionCore::new().with_policy(FusionPolicy::AccelOnly);
    let accel = [Q16::ZERO, Q16::ZERO, Q16::ONE];
    let mag = [Q16::ONE, Q16::ZERO, Q16::ZERO];
    bootstrap(&mut core, accel, mag);

    for _ in 0..10 {
        core.set_accelerometer(accel);
        core.set_gyroscope([Q16::from_num(10.0), Q16::ZERO, Q16::ZERO]);
        core.set_magnetometer(mag);
        core.update(Q16::from_num(0.01)).unwrap();
    }

    let angles = core.fetch_angles();
    assert!((angles.roll.to_num::<f32>()).abs() < 0.1);
}
