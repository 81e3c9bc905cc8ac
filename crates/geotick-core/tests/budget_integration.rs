//! Property tests for execution budget bookkeeping under arbitrary sessions.

use std::time::Duration;

use geotick_core::simulation::{ScenarioAction, ScenarioStep, ScriptedFix};
use geotick_core::storage::ControllerConfig;
use geotick_core::{ApplicationState, ControllerState, LocationError, Scenario, Simulator};
use proptest::prelude::*;

fn action_strategy() -> impl Strategy<Value = ScenarioAction> {
    prop_oneof![
        4 => (1.0f64..300.0).prop_map(|accuracy| ScenarioAction::Fixes {
            fixes: vec![ScriptedFix { latitude: 0.0, longitude: 0.0, accuracy }],
        }),
        1 => Just(ScenarioAction::Fixes { fixes: Vec::new() }),
        1 => Just(ScenarioAction::Error { error: LocationError::Network }),
        2 => Just(ScenarioAction::EnterBackground),
        2 => Just(ScenarioAction::BecomeActive),
        2 => Just(ScenarioAction::BudgetExpired),
        1 => (proptest::option::of(0.0f64..200.0), proptest::option::of(0.0f64..200.0)).prop_map(
            |(check_interval_secs, acceptable_accuracy)| ScenarioAction::Start {
                check_interval_secs,
                acceptable_accuracy,
            }
        ),
        1 => Just(ScenarioAction::Stop),
    ]
}

fn scenario_strategy() -> impl Strategy<Value = Scenario> {
    (
        prop::bool::ANY,
        prop::option::of(1.0f64..60.0),
        prop::collection::vec((0.0f64..400.0, action_strategy()), 0..40),
    )
        .prop_map(|(background, lifetime, steps)| Scenario {
            name: "fuzz".into(),
            application_state: if background {
                ApplicationState::Background
            } else {
                ApplicationState::Active
            },
            check_interval_secs: Some(5.0),
            budget_lifetime_secs: lifetime,
            steps: steps
                .into_iter()
                .map(|(at_secs, action)| ScenarioStep { at_secs, action })
                .collect(),
            ..Scenario::default()
        })
}

proptest! {
    #[test]
    fn at_most_one_grant_is_ever_held(scenario in scenario_strategy()) {
        let report = Simulator::new(scenario, &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(500));

        prop_assert!(report.budget.max_outstanding <= 1);
        prop_assert_eq!(report.budget.unknown_releases, 0);
        prop_assert!(report.budget.released <= report.budget.acquired);
    }

    #[test]
    fn stopping_releases_everything(scenario in scenario_strategy()) {
        let mut scenario = scenario;
        scenario.steps.push(ScenarioStep { at_secs: 450.0, action: ScenarioAction::Stop });

        let report = Simulator::new(scenario, &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(500));

        prop_assert_eq!(report.final_state, ControllerState::Stopped);
        prop_assert_eq!(report.budget.outstanding, 0);
        prop_assert!(report.pending_timers.is_empty());
        prop_assert!(!report.source.active);
        prop_assert!(!report.subscribed);
    }

    #[test]
    fn reports_only_fixes_within_threshold(scenario in scenario_strategy()) {
        let report = Simulator::new(scenario, &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(500));

        // Default threshold is 100; starts in the script may raise it to 200.
        for (_, fixes) in report.reports() {
            prop_assert!(!fixes.is_empty());
            let last = fixes.last().unwrap();
            prop_assert!(last.horizontal_accuracy <= 200.0);
        }
    }
}
