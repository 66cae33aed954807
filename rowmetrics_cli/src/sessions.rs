//! The `sessions` subcommand family: list/show/delete persisted sessions.

use rowmetrics_config::Config;
use rowmetrics_core::session::{SessionController, UnsyncedWallClock};
use rowmetrics_hardware::FileSessionStore;
use rowmetrics_traits::clock::MonotonicClock;
use serde_json::json;
use std::sync::Arc;

use crate::cli::SessionsAction;

fn controller(
    cfg: &Config,
    data_dir: &std::path::Path,
) -> eyre::Result<SessionController<FileSessionStore>> {
    let store = FileSessionStore::new(data_dir)
        .map_err(|e| eyre::eyre!("open session store {:?}: {}", data_dir, e))?;
    let clock = Arc::new(MonotonicClock::new());
    Ok(SessionController::new(store, clock, Arc::new(UnsyncedWallClock), cfg))
}

pub fn run(
    cfg: &Config,
    data_dir: &std::path::Path,
    action: SessionsAction,
    json: bool,
) -> eyre::Result<()> {
    let ctl = controller(cfg, data_dir)?;
    match action {
        SessionsAction::List => {
            let recent = ctl.list_recent()?;
            if json {
                let arr: Vec<_> = recent
                    .iter()
                    .map(|r| {
                        json!({
                            "id": r.id,
                            "duration_s": r.duration_s,
                            "distance_m": r.distance_m,
                            "stroke_count": r.stroke_count,
                            "calories_kcal": r.calories_kcal,
                            "synced": r.synced,
                        })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(arr));
            } else if recent.is_empty() {
                println!("no sessions recorded");
            } else {
                for r in &recent {
                    println!(
                        "{:>5}  {:>6}s  {:>8.1}m  {:>4} strokes  {:>6.0} kcal  synced={}",
                        r.id, r.duration_s, r.distance_m, r.stroke_count, r.calories_kcal, r.synced
                    );
                }
            }
            Ok(())
        }
        SessionsAction::Show { id } => {
            let Some(record) = ctl.load_record(id)? else {
                return Err(rowmetrics_core::RowError::Contract(format!("no session with id {id}")).into());
            };
            let samples = ctl.load_samples(id)?;
            if json {
                println!(
                    "{}",
                    json!({
                        "id": record.id,
                        "start_unix_ms": record.start_unix_ms,
                        "duration_s": record.duration_s,
                        "distance_m": record.distance_m,
                        "stroke_count": record.stroke_count,
                        "calories_kcal": record.calories_kcal,
                        "power_avg_w": record.power_avg_w,
                        "pace_avg_s500": record.pace_avg_s500,
                        "drag_factor": record.drag_factor,
                        "avg_hr": record.avg_hr,
                        "max_hr": record.max_hr,
                        "avg_stroke_rate": record.avg_stroke_rate,
                        "sample_count": samples.len(),
                        "synced": record.synced,
                    })
                );
            } else {
                println!("session {}", record.id);
                println!("  duration:   {}s", record.duration_s);
                println!("  distance:   {:.1}m", record.distance_m);
                println!("  strokes:    {}", record.stroke_count);
                println!("  calories:   {:.0} kcal", record.calories_kcal);
                println!("  power avg:  {:.0}W", record.power_avg_w);
                println!("  avg hr:     {}", record.avg_hr);
                println!("  samples:    {}", samples.len());
                println!("  synced:     {}", record.synced);
            }
            Ok(())
        }
        SessionsAction::Rm { id } => {
            ctl.delete(id)?;
            println!("deleted session {id}");
            Ok(())
        }
    }
}
