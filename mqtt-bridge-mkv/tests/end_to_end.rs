//! Two controllers of different types polled through the scheduler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::Form;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::task::JoinSet;

use hubbridge_common::{DeviceStatus, Reading, ReadingValue};
use hubbridge_framework::{DeviceIdentity, PublishStats, StateSink};
use mqtt_bridge_mkv::catalog::Catalog;
use mqtt_bridge_mkv::client::{HttpDeviceClient, question_string};
use mqtt_bridge_mkv::config::DeviceConfig;
use mqtt_bridge_mkv::scheduler::{PollSettings, Scheduler};

#[derive(Default)]
struct RecordingSink {
    announced: Mutex<HashMap<String, Vec<Reading>>>,
    states: Mutex<HashMap<String, Vec<Vec<Reading>>>>,
    availability: Mutex<HashMap<String, DeviceStatus>>,
}

impl RecordingSink {
    fn first_state(&self, device: &str) -> Option<Vec<Reading>> {
        self.states
            .lock()
            .unwrap()
            .get(device)
            .and_then(|cycles| cycles.first().cloned())
    }
}

impl StateSink for RecordingSink {
    async fn publish_discovery(&self, device: &DeviceIdentity, readings: &[Reading]) -> PublishStats {
        self.announced
            .lock()
            .unwrap()
            .entry(device.name.clone())
            .or_default()
            .extend_from_slice(readings);
        PublishStats {
            success: readings.len(),
            failed: 0,
        }
    }

    async fn publish_state(&self, device: &DeviceIdentity, readings: &[Reading], _: i64) -> PublishStats {
        self.states
            .lock()
            .unwrap()
            .entry(device.name.clone())
            .or_default()
            .push(readings.to_vec());
        PublishStats {
            success: readings.len(),
            failed: 0,
        }
    }

    async fn publish_availability(
        &self,
        device: &DeviceIdentity,
        status: DeviceStatus,
    ) -> hubbridge_framework::Result<()> {
        self.availability
            .lock()
            .unwrap()
            .insert(device.name.clone(), status);
        Ok(())
    }
}

/// Raw field a mock controller reports for a register.
fn raw_value(id: &str) -> u32 {
    match id {
        // 2 hours of running, 1 hour of it in the lowest VSD band
        "3007.01" => 7200,
        "3007.05" => 3600,
        _ => 0x0002_0003,
    }
}

/// Serve the answer for one device type; any other question is rejected.
async fn mock_controller(catalog: &Catalog, device_type: &str) -> SocketAddr {
    let ids = catalog.question_ids(device_type).unwrap();
    let question = question_string(&ids);
    let answer: String = ids.iter().map(|id| format!("{:08X}", raw_value(id))).collect();

    let app = Router::new().route(
        "/cgi-bin/mkv.cgi",
        post(move |Form(form): Form<HashMap<String, String>>| async move {
            if form.get("QUESTION") == Some(&question) {
                (StatusCode::OK, answer)
            } else {
                (StatusCode::BAD_REQUEST, String::new())
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn device(name: &str, host: String, device_type: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        host,
        device_type: device_type.to_string(),
        timeout: Duration::from_secs(2),
    }
}

fn find<'a>(readings: &'a [Reading], name: &str) -> &'a Reading {
    readings
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no reading named {}", name))
}

#[tokio::test]
async fn test_two_device_types_end_to_end() {
    let catalog = Catalog::with_builtin();
    let shop = mock_controller(&catalog, "GA15VS23A").await;
    let yard = mock_controller(&catalog, "GA15VP13").await;

    let refused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let offline_addr = refused.local_addr().unwrap();
    drop(refused);

    let devices = vec![
        device("Shop", shop.to_string(), "GA15VS23A"),
        device("Yard", yard.to_string(), "GA15VP13"),
        device("Basement", offline_addr.to_string(), "GA15VP13"),
        device("Unknown", "127.0.0.1:1".to_string(), "GA90"),
    ];

    let sink = Arc::new(RecordingSink::default());
    let scheduler = Scheduler::new(catalog.clone(), Arc::new(HttpDeviceClient::default()), sink.clone())
        .with_settings(PollSettings {
            start_jitter: Duration::ZERO,
            ..PollSettings::default()
        });

    let mut tasks = JoinSet::new();
    let mut statuses = scheduler.spawn_all(&devices, &mut tasks).unwrap();
    assert_eq!(statuses.len(), 3);
    assert_eq!(tasks.len(), 3);

    for status in &mut statuses {
        tokio::time::timeout(Duration::from_secs(10), status.wait_for(|s| s.cycles >= 1))
            .await
            .expect("first cycle should complete")
            .unwrap();
    }

    for (name, device_type) in [("Shop", "GA15VS23A"), ("Yard", "GA15VP13")] {
        let readings = sink.first_state(name).expect("state published");
        let expected: Vec<(&str, &str)> = catalog
            .lookup(device_type)
            .unwrap()
            .iter()
            .flat_map(|d| d.fields.iter().map(|f| (f.name.as_str(), f.unit.as_str())))
            .collect();
        let actual: Vec<(&str, &str)> = readings
            .iter()
            .map(|r| (r.name.as_str(), r.unit.as_str()))
            .collect();
        assert_eq!(actual, expected, "{} readings", name);

        assert_eq!(find(&readings, "Running Hours").value, ReadingValue::Scaled(2.0));
        assert_eq!(find(&readings, "VSD 1-20").value, ReadingValue::Scaled(50.0));
        assert_eq!(find(&readings, "Motor requested rpm").value, ReadingValue::Integer(3));
        assert_eq!(find(&readings, "Motor actual rpm").value, ReadingValue::Integer(2));
        assert_eq!(find(&readings, "Controller Temperature").value, ReadingValue::Scaled(0.2));
        assert_eq!(find(&readings, "Compressor Outlet").value, ReadingValue::Scaled(0.002));
        assert_eq!(find(&readings, "Motor Starts").value, ReadingValue::Integer(0x0002_0003));

        assert_eq!(sink.announced.lock().unwrap()[name].len(), expected.len());
        assert_eq!(sink.availability.lock().unwrap()[name], DeviceStatus::Online);
    }

    // The unreachable controller fails on its own without holding up the others.
    assert!(sink.first_state("Basement").is_none());
    assert_eq!(sink.availability.lock().unwrap()["Basement"], DeviceStatus::Offline);
    let basement = statuses[2].borrow().clone();
    assert_eq!(basement.health.consecutive_failures, 1);
    assert!(basement.health.last_error.unwrap().contains("unreachable"));

    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}
