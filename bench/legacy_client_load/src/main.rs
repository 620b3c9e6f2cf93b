use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use codec::{AddToDataDefinition, ClientMessage, Open, RequestDataOnSimObject};

pub const SERVER_ADDR: &str = "127.0.0.1:10000";

fn handshake_bytes(definition_id: u32, request_id: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(codec::encode_client(
        &ClientMessage::Open(Open {
            app_name: "legacy_client_load".to_string(),
            reserved1: 0,
            reserved2: 0,
            sim_id: "D3P".to_string(),
            version: [4, 3],
            build: [0, 0],
        }),
        2,
        1,
    ));
    out.extend(codec::encode_client(
        &ClientMessage::AddToDataDefinition(AddToDataDefinition {
            definition_id,
            datum_name: "Plane Altitude".to_string(),
            units_name: "feet".to_string(),
            data_type: 4,
            epsilon: 0.0,
            datum_id: 0,
        }),
        2,
        2,
    ));
    out.extend(codec::encode_client(
        &ClientMessage::RequestDataOnSimObject(RequestDataOnSimObject {
            request_id,
            definition_id,
            object_id: 0,
            period: 4, // Second
            flags: 0,
            origin: 0,
            interval: 0,
            limit: 0,
        }),
        2,
        3,
    ));
    out
}

fn main() {
    let n: i32 = std::env::args()
        .nth(1)
        .expect("Usage: legacy_client_load <NUM CLIENTS>")
        .parse()
        .expect("invalid parameter, must be a number");

    let streams: Vec<TcpStream> = (0..n)
        .map(|i| {
            let i = i + 1;
            println!("#{i} opening connection...");
            let mut stream = TcpStream::connect(SERVER_ADDR).unwrap();
            stream.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
            stream.write_all(&handshake_bytes(1, i as u32)).unwrap();
            stream
        })
        .collect();

    let mut buf = [0; 4096];
    loop {
        for (i, mut stream) in streams.iter().enumerate() {
            let i = i + 1;
            match stream.read(&mut buf) {
                Ok(n) => println!("#{i} message received, {n} bytes"),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => eprintln!("#{i} error reading stream: {e}"),
            }
        }
    }
}
