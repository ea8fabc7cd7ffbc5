
use crate::capture::{write_pcap, MockSource};
use crate::config::{Config, Inputs};
use crate::dataset::analyze;
use crate::error::Error;
use crate::fairness::fairness;
use crate::ingress::analyze_ingress;
use packets::PacketFactory;
use std::fs;

fn client() -> PacketFactory {
    PacketFactory::new("10.1.0.1", 45000, "10.2.0.1", 9000)
}

/// SYN, one data segment, its echoing ACK and a FIN, as `(offset, frame)`.
fn handshake_data_fin() -> Vec<(f64, Vec<u8>)> {
    let client = client().timestamps(100, 0);
    let server = client.reverse().timestamps(500, 100);
    vec![
        (0.0, client.syn(1000)),
        (0.01, client.data(1000, 1, &[0u8; 100])),
        (0.05, server.ack(1, 1100)),
        (0.2, client.fin(1100, 1)),
    ]
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_single_exchange() {
    let mut source = MockSource::new();
    for (ts, frame) in handshake_data_fin() {
        source.inject(ts, frame);
    }
    let report = analyze_ingress(&mut source, 0.2).unwrap();
    assert_eq!(source.remaining(), 0);

    assert_eq!(report.flows.len(), 1);
    let flow = &report.flows[0];
    assert_eq!(flow.index, 0);
    assert_eq!(flow.key.client_port, 45000);

    assert_eq!(flow.rtt.len(), 1, "one echo, one sample");
    assert!(approx(flow.rtt[0].rtt, 40.0));
    assert!(approx(flow.rtt[0].time, 0.05));
    assert!(flow.retransmissions.is_empty());

    // the FIN closes window 0; the connection's partial window 1 is empty
    assert_eq!(flow.records.len(), 1);
    let rec = &flow.records[0];
    assert_eq!(rec.window, 0);
    assert_eq!((rec.packets, rec.retransmissions), (1, 0));
    // 100 payload bytes over 0.2s
    assert!(approx(rec.sending_rate, 800.0 / 0.2));
    assert!(rec.rtt.map_or(false, |rtt| approx(rtt, 40.0)));
    // 100 bytes outstanding after the data, none after the ACK
    assert!(approx(rec.inflight, 100.0 * 8.0 / 2.0));

    assert_eq!(report.totals.len(), 1);
    assert_eq!(report.totals[0].values.packets, 1);
    assert_eq!(report.stats.frames, 4);
    assert_eq!(report.stats.ignored, 0);
}

#[test]
fn test_retransmission_only_while_unacked() {
    let client = client();
    let server = client.reverse();
    let mut source = MockSource::new();
    source.inject(0.0, client.syn(1000));
    source.inject(0.01, client.data(1001, 1, &[0u8; 100]));
    source.inject(0.05, client.data(1001, 1, &[0u8; 100]));
    source.inject(0.08, server.ack(1, 1101));
    source.inject(0.1, client.data(1001, 1, &[0u8; 100]));
    source.inject(0.3, server.ack(1, 1101));

    let report = analyze_ingress(&mut source, 0.2).unwrap();
    let flow = &report.flows[0];
    assert_eq!(flow.retransmissions, vec![0.05]);
    assert_eq!(flow.records[0].retransmissions, 1);
    assert_eq!(flow.records[0].packets, 2);
    assert_eq!(report.totals[0].values.retransmissions, 1);
}

#[test]
fn test_sequence_wraparound() {
    let client = client();
    let server = client.reverse();
    let isn = u32::MAX - 500;
    let mut source = MockSource::new();
    source.inject(0.0, client.syn(isn));
    source.inject(0.01, client.data(isn.wrapping_add(1), 1, &[0u8; 1000]));
    source.inject(0.02, client.data(isn.wrapping_add(1001), 1, &[0u8; 1000]));
    source.inject(0.03, server.ack(1, isn.wrapping_add(2001)));
    source.inject(0.25, server.ack(1, isn.wrapping_add(2001)));

    let report = analyze_ingress(&mut source, 0.2).unwrap();
    let flow = &report.flows[0];
    assert!(flow.retransmissions.is_empty());
    let rec = &flow.records[0];
    assert_eq!(rec.packets, 2);
    assert!(approx(rec.inflight, (1001.0 + 2001.0 + 0.0) * 8.0 / 3.0));
}

#[test]
fn test_inflight_never_negative() {
    let client = client();
    let server = client.reverse();
    let mut source = MockSource::new();
    source.inject(0.0, client.syn(1000));
    // acknowledgment past anything sent, then a late small one
    source.inject(0.01, server.ack(1, 90_000));
    source.inject(0.02, client.data(1001, 1, &[0u8; 10]));
    source.inject(0.03, server.ack(1, 1005));
    source.inject(0.5, server.ack(1, 1011));

    let report = analyze_ingress(&mut source, 0.2).unwrap();
    for rec in &report.flows[0].records {
        assert!(rec.inflight >= 0.0);
    }
    assert_eq!(report.flows[0].records[0].inflight, 0.0);
}

#[test]
fn test_untracked_and_foreign_frames() {
    let client = client();
    let mut source = MockSource::new();
    source.inject(0.0, client.data(1, 1, b"before syn"));
    let mut udp = client.syn(7);
    udp[14 + 9] = 17;
    source.inject(0.01, udp);
    source.inject(0.02, client.syn(1000));
    source.inject(0.03, client.syn(5000));
    source.inject(0.04, client.data(1001, 1, b"x"));

    let report = analyze_ingress(&mut source, 0.2).unwrap();
    assert_eq!(report.stats.frames, 5);
    assert_eq!(report.stats.skipped, 1);
    // data before the SYN and the duplicate SYN
    assert_eq!(report.stats.ignored, 2);
    assert_eq!(report.flows.len(), 1);
    assert_eq!(report.flows[0].records[0].packets, 1);
}

#[test]
fn test_fair_flows_score_one() {
    let a = client();
    let b = PacketFactory::new("10.1.0.2", 45001, "10.2.0.2", 9000);
    let mut source = MockSource::new();
    source.inject(0.0, a.syn(0));
    source.inject(0.0, b.syn(0));
    for i in 0..4u32 {
        let t = 0.01 + i as f64 * 0.1;
        source.inject(t, a.data(1 + i * 500, 1, &[0u8; 500]));
        source.inject(t, b.data(1 + i * 500, 1, &[0u8; 500]));
    }
    source.inject(0.45, a.fin(2001, 1));
    source.inject(0.45, b.fin(2001, 1));

    let report = analyze_ingress(&mut source, 0.2).unwrap();
    let rates = report.sending_rate();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].len(), 2);

    let index = fairness(&rates);
    assert_eq!(index.len(), 2);
    assert!(index.iter().all(|p| approx(p.value, 1.0)));
    assert!(approx(
        report.totals[0].values.sending_rate,
        rates[0][0].value + rates[1][0].value
    ));
}

#[test]
fn test_analyze_experiment_directory() {
    let dir = tempfile::tempdir().unwrap();
    let frames: Vec<_> = handshake_data_fin()
        .into_iter()
        .map(|(ts, frame)| (1000.0 + ts, frame))
        .collect();
    fs::write(dir.path().join("s1.pcap"), write_pcap(&frames)).unwrap();
    fs::write(dir.path().join("s3.pcap"), write_pcap(&frames)).unwrap();
    fs::write(
        dir.path().join("10.1.0.1.bbr"),
        "10:00:00.000000;bbr:(bw:10Mbps,mrtt:20,pacing_gain:1,cwnd_gain:1);cwnd:10;ssthresh:7\n\
         10:00:00.100000;bbr:(bw:10Mbps,mrtt:20,pacing_gain:1.25,cwnd_gain:2);cwnd:20;ssthresh:7\n\
         not a sample\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("s2-eth2-tbf.buffer"),
        "10:00:00.050000 backlog 2Kb\n",
    )
    .unwrap();

    let config = Config::default();
    let inputs = Inputs::discover(dir.path(), &config).unwrap();
    let dataset = analyze(&inputs, &config).unwrap();

    assert_eq!(dataset.flows.len(), 1);
    assert_eq!(dataset.flows[0].rtt.len(), 1);
    assert!(approx(dataset.flows[0].rtt[0].rtt, 40.0));
    assert_eq!(dataset.throughput.len(), 1);
    assert_eq!(dataset.fairness.throughput.len(), 1);
    assert!(approx(dataset.fairness.throughput[0].value, 1.0));

    assert_eq!(dataset.bbr.len(), 1);
    assert_eq!(dataset.bbr[0].stats.skipped, 1);
    assert!(approx(dataset.backlog[0].samples[0].time, 0.05));
    assert_eq!(dataset.sync_phases.len(), 1);
    assert_eq!(dataset.sync_phases[0].start, 0.0);
    assert!(approx(dataset.sync_phases[0].duration, 100.0));

    let json = serde_json::to_value(&dataset).unwrap();
    assert_eq!(json["flows"][0]["records"][0]["window"], 0);
    assert!(dataset.to_string().contains("sync phases: 1"));
}

#[test]
fn test_missing_capture_aborts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("s1.pcap"), write_pcap(&[])).unwrap();
    let config = Config::default();
    let inputs = Inputs::discover(dir.path(), &config).unwrap();
    match analyze(&inputs, &config) {
        Err(Error::MissingInput(path)) => assert_eq!(path, dir.path().join("s3.pcap")),
        other => panic!("expected missing input, got {:?}", other.map(|_| ())),
    }
}
