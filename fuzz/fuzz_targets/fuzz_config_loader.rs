#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz TOML parsing of Config; parse errors and validation errors are
    // both acceptable outcomes, a panic is not.
    let parsed = toml::from_str::<rowmetrics_config::Config>(data);
    if let Ok(cfg) = parsed {
        let _ = cfg.validate();
    }
});
