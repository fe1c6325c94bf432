use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "wtunnels-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn tunnel_rules_prints_ofctl_script() {
    let output = Command::new(env!("CARGO_BIN_EXE_tunnel_rules"))
        .args(["--hosts", "2", "--central-switches", "2", "--quiet"])
        .output()
        .expect("run tunnel_rules");
    assert!(
        output.status.success(),
        "tunnel_rules failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<_> = stdout.lines().collect();
    // 2*2*1*2 条隧道 + 2 条回落 + 1 条丢弃
    assert_eq!(lines.len(), 11, "stdout={stdout}");
    assert!(lines.contains(
        &"ovs-ofctl -O OpenFlow15 add-flow s0 priority=32768,udp,nw_src=10.0.0.1,nw_dst=10.0.0.2,udp_src=20016,actions=output:2"
    ));
    assert_eq!(
        lines.last().copied(),
        Some("ovs-ofctl -O OpenFlow15 add-flow s3 priority=0,actions=drop")
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("rules=11 tunnel=8 fallback=2 drop=1 expected=11"),
        "stderr={stderr}"
    );
}

#[test]
fn tunnel_rules_writes_json_from_config_file() {
    let dir = unique_temp_dir("tunnel-rules-json");
    let config = dir.join("fabric.json");
    fs::write(
        &config,
        r#"{ "schema_version": 1, "hosts": 3, "central_switches": 3 }"#,
    )
    .expect("write config");
    let out = dir.join("rules.json");

    let output = Command::new(env!("CARGO_BIN_EXE_tunnel_rules"))
        .args([
            "--config",
            config.to_str().unwrap(),
            "--format",
            "json",
            "--out",
            out.to_str().unwrap(),
            "--dry-run",
            "--quiet",
        ])
        .output()
        .expect("run tunnel_rules");
    assert!(
        output.status.success(),
        "tunnel_rules failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let raw = fs::read_to_string(&out).expect("read rules.json");
    let rules: Value = serde_json::from_str(&raw).expect("parse rules.json");
    let rules = rules.as_array().expect("array");
    assert_eq!(rules.len(), 2 * 3 * 2 * 3 + 3 + 2);

    let first = &rules[0];
    assert_eq!(first["switch"], 0);
    assert_eq!(first["match"]["protocol"], "udp");
    assert_eq!(first["match"]["udp_src_port"], 20_016);
    assert_eq!(first["action"]["type"], "output");
    assert_eq!(first["kind"]["kind"], "tunnel");
    assert_eq!(first["kind"]["leg"], "ingress");

    let drops = rules
        .iter()
        .filter(|r| r["action"]["type"] == "drop")
        .map(|r| r["switch"].as_u64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(drops, vec![4, 5]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dry run: installed=41 switches=6"), "stderr={stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tunnel_rules_exits_nonzero_on_port_overlap() {
    let output = Command::new(env!("CARGO_BIN_EXE_tunnel_rules"))
        .args(["--hosts", "2", "--send-base", "10050", "--quiet"])
        .output()
        .expect("run tunnel_rules");
    assert!(!output.status.success(), "expected non-zero exit, got success");
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("receive and send port ranges overlap"),
        "stderr did not contain expected message: {stderr}"
    );
}

#[test]
fn tunnel_rules_rejects_more_centrals_than_tunnels() {
    let output = Command::new(env!("CARGO_BIN_EXE_tunnel_rules"))
        .args(["--hosts", "2", "--central-switches", "17", "--quiet"])
        .output()
        .expect("run tunnel_rules");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("17 tunnels requested"), "stderr={stderr}");
}
