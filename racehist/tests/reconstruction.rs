use racehist::core::edits::{Edit, StintOrderChange};
use racehist::core::handle_history::{handle_history, LapSource};
use racehist::core::lap::{DriverIndex, LapAction, LapIndex};
use racehist::core::race_history::RaceHistory;
use racehist::core::stint::TyreType;
use racehist::post::snapshot::{read_snapshot, write_snapshot};
use racehist::pre::read_history_pars::HistoryPars;
use racehist::pre::read_raw_laps::parse_raw_laps;

const PARS: &str = r##"{
    "race_pars": {
        "season": 2012,
        "track_name": "Shanghai",
        "tot_no_laps": 10,
        "tyre_types": ["Option", "Prime"]
    },
    "driver_pars_all": [
        {"initials": "ROS", "name": "Nico Rosberg", "color": "#00d2be", "tyres": ["Option", "Prime"]},
        {"initials": "BUT", "name": "Jenson Button", "color": "orange", "tyres": ["Option", "Prime"]},
        {"initials": "HAM", "name": "Lewis Hamilton", "tyres": ["Prime", "Option"]}
    ]
}"##;

fn lap_csv() -> String {
    let drivers = [
        ("Nico Rosberg", 100.0, 4),
        ("Jenson Button", 100.6, 5),
        ("Lewis Hamilton", 101.5, 6),
    ];

    let mut csv = String::from("driver,lap,lap_time,in_lap,retired\n");
    for (name, base, in_lap) in drivers.iter() {
        for lap in 1..=10u32 {
            let is_in_lap = lap == *in_lap;
            let lap_time = if is_in_lap {
                base + 18.0
            } else if lap == in_lap + 1 {
                base + 4.0
            } else {
                base + 0.1 * lap as f64
            };
            csv.push_str(&format!("{},{},{},{},false\n", name, lap, lap_time, is_in_lap));
        }
    }
    csv
}

fn reconstruct(edits: &[Edit]) -> (HistoryPars, RaceHistory) {
    let pars: HistoryPars = serde_json::from_str(PARS).unwrap();
    pars.validate().unwrap();
    let raw_laps = parse_raw_laps(lap_csv().as_bytes(), &pars.driver_names()).unwrap();

    let (history, _) = handle_history(&pars, LapSource::Raw(raw_laps), edits, None).unwrap();
    (pars, history)
}

#[test]
fn raw_laps_are_reconstructed() {
    let (_, history) = reconstruct(&[]);

    assert_eq!(history.no_drivers(), 3);
    assert_eq!(history.tot_no_laps(), 10);

    let stint_lengths: Vec<usize> = history
        .stints(DriverIndex(2))
        .iter()
        .map(|stint| stint.length())
        .collect();
    assert_eq!(stint_lengths, vec![6, 4]);

    let cum = history.cumulative_times();
    for driver_cum in cum.iter() {
        assert!(driver_cum.windows(2).all(|pair| pair[1] > pair[0]));
    }

    let mut order = history.indexes_by_position(LapIndex(9));
    order.sort_by_key(|d| d.0);
    assert_eq!(order, vec![DriverIndex(0), DriverIndex(1), DriverIndex(2)]);
}

#[test]
fn edits_change_strategy_and_outcome() {
    let edits = vec![
        Edit::StintOrderChanged {
            driver: DriverIndex(2),
            stint: 0,
            change: StintOrderChange::Remove,
        },
        Edit::ChangeAction {
            driver: DriverIndex(1),
            lap: LapIndex(7),
            action: LapAction::Retire,
        },
    ];
    let (_, history) = reconstruct(&edits);

    assert_eq!(history.stints(DriverIndex(2)).len(), 1);
    assert_eq!(history.stints(DriverIndex(2))[0].length(), 10);
    assert_eq!(history.retirement_lap(DriverIndex(1)), Some(LapIndex(7)));
    assert_eq!(history.cumulative_times()[1].len(), 8);
    assert_eq!(
        history.indexes_by_position(LapIndex(9)).last(),
        Some(&DriverIndex(1))
    );
}

#[test]
fn snapshot_round_trip_keeps_laps_and_tyres() {
    let edits = vec![Edit::TyreTypeChanged {
        driver: DriverIndex(0),
        stint: 1,
        tyre: TyreType::from("Option"),
    }];
    let (pars, history) = reconstruct(&edits);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shanghai.txt");
    write_snapshot(&path, &history).unwrap();

    let snapshot = read_snapshot(&path, &pars.driver_names()).unwrap();
    assert!(snapshot.tyre_usage.is_some());

    let restored = RaceHistory::from_snapshot(
        &pars.race_pars,
        &pars.driver_pars_all,
        snapshot.laps,
        snapshot.tyre_usage,
    );

    assert_eq!(restored.all_laps(), history.all_laps());
    assert_eq!(restored.all_tyre_usage(), history.all_tyre_usage());
    assert_eq!(restored.tyre_usage(DriverIndex(0))[1], TyreType::from("Option"));
    assert_eq!(restored.position_grid(), history.position_grid());
}
