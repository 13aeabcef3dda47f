//! Drives the device client against a simulated ventilation unit
//! answering on a loopback UDP socket.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use ventobridge::device::{ClientSettings, DeviceClient, DeviceError, UdpTransport};
use ventobridge::protocol::codec;
use ventobridge::protocol::params;
use ventobridge::protocol::{FunctionCode, Value, ValueKind};

const ID: &str = "DEFAULT_DEVICEID";
const PW: &str = "1111";

fn initial_value(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Int { min, .. } => Value::Int(min),
        ValueKind::Enum { .. } => Value::Int(0),
    }
}

/// Spawns a unit that keeps a parameter table and answers read and write
/// frames, ignoring the first `drop_first` requests to simulate loss.
async fn spawn_unit(drop_first: usize) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut state: BTreeMap<u8, Value> = params::PARAMETERS
            .iter()
            .map(|p| (p.code, initial_value(p.kind)))
            .collect();
        let mut dropped = 0;
        let mut buf = vec![0u8; 1024];

        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(_) => return,
            };
            if dropped < drop_first {
                dropped += 1;
                continue;
            }
            let frame = match codec::decode_frame(&buf[..len]) {
                Ok(frame) => frame,
                Err(_) => continue,
            };
            match frame.function {
                FunctionCode::Read => {
                    let values: Vec<_> = frame
                        .entries
                        .iter()
                        .map(|e| (params::by_code(e.code).unwrap(), state[&e.code]))
                        .collect();
                    let reply = codec::response_frame(ID, PW, &values).unwrap();
                    let _ = socket.send_to(&reply, peer).await;
                }
                FunctionCode::Write => {
                    let entry = &frame.entries[0];
                    let param = params::by_code(entry.code).unwrap();
                    let value = param.decode_value(&entry.data);
                    state.insert(entry.code, value);
                    let reply = codec::response_frame(ID, PW, &[(param, value)]).unwrap();
                    let _ = socket.send_to(&reply, peer).await;
                }
                FunctionCode::Response => {}
            }
        }
    });

    addr
}

async fn client_for(addr: SocketAddr, settings: ClientSettings) -> DeviceClient {
    let transport = UdpTransport::connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    DeviceClient::new(ID, PW, settings, Box::new(transport))
}

fn fast_settings(retries: u32) -> ClientSettings {
    ClientSettings {
        timeout: Duration::from_millis(200),
        retries,
    }
}

#[tokio::test]
async fn query_reads_the_full_parameter_table() {
    let addr = spawn_unit(0).await;
    let client = client_for(addr, fast_settings(3)).await;

    let values = client.query().await.unwrap();
    assert_eq!(values.len(), params::PARAMETERS.len());
    assert_eq!(values.get(&0x03), Some(&Value::Bool(false)));
    assert_eq!(values.get(&0x0B), Some(&Value::Int(40)));
}

#[tokio::test]
async fn written_values_stick_across_polls() {
    let addr = spawn_unit(0).await;
    let client = client_for(addr, fast_settings(3)).await;

    let speed = params::by_name("fan-speed").unwrap();
    let acked = client.set_parameter(speed, Value::Int(3)).await.unwrap();
    assert_eq!(acked.get(&speed.code), Some(&Value::Int(3)));

    let values = client.query().await.unwrap();
    assert_eq!(values.get(&speed.code), Some(&Value::Int(3)));
}

#[tokio::test]
async fn lost_datagrams_are_recovered_by_retries() {
    // The unit swallows the first two requests; the third attempt lands
    let addr = spawn_unit(2).await;
    let client = client_for(addr, fast_settings(3)).await;

    let values = client.query().await.unwrap();
    assert_eq!(values.len(), params::PARAMETERS.len());
}

#[tokio::test]
async fn silent_unit_is_reported_unreachable() {
    let addr = spawn_unit(usize::MAX).await;
    let client = client_for(addr, fast_settings(2)).await;

    match client.query().await {
        Err(DeviceError::Unreachable { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected Unreachable, got {:?}", other.map(|v| v.len())),
    }
}
