use rowmetrics_config::load_physics_csv;

#[test]
fn loads_single_row_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physics.csv");
    std::fs::write(&path, "moment_of_inertia,initial_k\n0.105,0.00012\n").unwrap();
    let physics = load_physics_csv(&path).expect("valid physics CSV");
    assert_eq!(physics.moment_of_inertia, 0.105);
    assert_eq!(physics.initial_k, 0.00012);
    assert_eq!(physics.magnets_per_rev, 4, "CSV doesn't carry a magnet count");
}

#[test]
fn rejects_wrong_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_headers.csv");
    std::fs::write(&path, "inertia,k\n0.1,0.0001\n").unwrap();
    let err = load_physics_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("moment_of_inertia,initial_k"));
}

#[test]
fn rejects_multiple_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_rows.csv");
    std::fs::write(
        &path,
        "moment_of_inertia,initial_k\n0.1,0.0001\n0.11,0.00012\n",
    )
    .unwrap();
    let err = load_physics_csv(&path).expect_err("should error on >1 data row");
    assert!(format!("{err}").contains("exactly one data row"));
}

#[test]
fn rejects_out_of_range_k() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_k.csv");
    std::fs::write(&path, "moment_of_inertia,initial_k\n0.1,0.5\n").unwrap();
    let err = load_physics_csv(&path).expect_err("should error on k out of range");
    assert!(format!("{err}").contains("initial_k"));
}
