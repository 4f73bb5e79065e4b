use std::io::Write;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::NamedTempFile;

fn run_agent(args: &[&str]) -> Output {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("paycode"));
    cmd.arg("--output")
        .arg("json")
        .args(args)
        .env_remove("PAYCODE_UNIT")
        .env_remove("PAYCODE_FIAT_RATE")
        .env_remove("PAYCODE_FIAT_CODE")
        .env_remove("RUST_LOG");
    cmd.output().expect("failed to run paycode")
}

fn parse_stdout(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout should be UTF-8");
    serde_json::from_str(stdout.trim()).expect("stdout should contain JSON")
}

fn parse_agent_error(output: &Output) -> Value {
    let stderr = String::from_utf8(output.stderr.clone()).expect("stderr should be UTF-8");
    serde_json::from_str(stderr.trim()).expect("stderr should contain JSON error payload")
}

#[test]
fn classifies_lud17_link() {
    let output = run_agent(&["classify", "lnurlp://example.com/.well-known/lnurlp/alice"]);
    assert_eq!(output.status.code(), Some(0));

    let payload = parse_stdout(&output);
    assert_eq!(payload["kind"], "lnurlPending");
    assert_eq!(payload["domain"], "example.com");
    assert_eq!(
        payload["classification"]["target"]["url"],
        "https://example.com/.well-known/lnurlp/alice"
    );
}

#[test]
fn lightning_address_reports_well_known_url() {
    let output = run_agent(&["classify", "Alice@Example.com"]);
    assert_eq!(output.status.code(), Some(0));

    let payload = parse_stdout(&output);
    assert_eq!(payload["kind"], "lightningAddressRequest");
    assert_eq!(
        payload["wellKnownUrl"],
        "https://example.com/.well-known/lnurlp/alice"
    );
}

#[test]
fn undecodable_lnurl_is_a_decode_failure() {
    let output = run_agent(&["classify", "lnurl1qqqqqqqq"]);
    assert_eq!(output.status.code(), Some(1));

    let payload = parse_agent_error(&output);
    assert_eq!(payload["error"], "decode_failed");
    assert_eq!(payload["code"], 1001);
    assert_eq!(payload["name"], "BECH32_DECODE");
}

#[test]
fn fractional_satoshis_are_rejected() {
    let output = run_agent(&["format", "1.5"]);
    assert_eq!(output.status.code(), Some(1));

    let payload = parse_agent_error(&output);
    assert_eq!(payload["name"], "NOT_AN_INTEGER");
}

#[test]
fn formats_sats_with_thousands_separators() {
    let output = run_agent(&["format", "100000000", "--unit", "sat"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(parse_stdout(&output)["formatted"], "100,000,000 sats");
}

#[test]
fn fiat_requires_a_rate() {
    let output = run_agent(&["fiat", "1000"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(parse_agent_error(&output)["error"], "invalid_input");

    let output = run_agent(&["fiat", "1000", "--rate", "50000", "--currency", "USD"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(parse_stdout(&output)["fiat"], "0.50 USD");
}

#[test]
fn eval_recovers_previous_value() {
    let output = run_agent(&["eval", "12+"]);
    assert_eq!(parse_stdout(&output)["result"], "12");

    let output = run_agent(&["eval", "4/0", "--previous", "4"]);
    assert_eq!(output.status.code(), Some(0));
    let payload = parse_stdout(&output);
    assert_eq!(payload["result"], "4");
    assert_eq!(payload["recovered"], true);
}

#[test]
fn eval_survives_runaway_nesting() {
    let nested = format!("{}1", "(".repeat(10_000));
    let output = run_agent(&["eval", &nested, "--previous", "9"]);
    assert_eq!(output.status.code(), Some(0));
    let payload = parse_stdout(&output);
    assert_eq!(payload["result"], "9");
    assert_eq!(payload["recovered"], true);

    let output = run_agent(&["eval", "12x"]);
    assert_eq!(parse_stdout(&output)["result"], "12");
}

#[test]
fn converts_between_units() {
    let output = run_agent(&["convert", "1", "--from", "bitcoin", "--to", "sat"]);
    assert_eq!(parse_stdout(&output)["result"], "100000000");

    let output = run_agent(&["convert", "1", "--from", "bitcoin", "--to", "furlong"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(parse_agent_error(&output)["name"], "UNKNOWN_UNIT");
}

#[test]
fn parses_bitcoin_uri_amount_exactly() {
    let output = run_agent(&["uri", "bitcoin:bc1qexample?amount=0.00015&label=Coffee"]);
    assert_eq!(output.status.code(), Some(0));

    let payload = parse_stdout(&output);
    assert_eq!(payload["address"], "bc1qexample");
    assert_eq!(payload["amount"], 15000);
    assert_eq!(payload["label"], "Coffee");
}

#[test]
fn batch_reports_each_row() {
    let mut csv_file = NamedTempFile::new().expect("failed to create temp csv");
    writeln!(csv_file, "name,code").expect("failed to write csv header");
    writeln!(csv_file, "alice,alice@example.com").expect("failed to write csv row");
    writeln!(csv_file, "broken,lnurl1qqqqqqqq").expect("failed to write csv row");
    writeln!(csv_file, "noise,hello").expect("failed to write csv row");
    csv_file.flush().expect("failed to flush csv");

    let path = csv_file.path().to_str().expect("temp path should be UTF-8");
    let output = run_agent(&["classify-batch", path]);
    assert_eq!(output.status.code(), Some(0));

    let rows = parse_stdout(&output);
    let rows = rows.as_array().expect("rows should be an array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["row"], 2);
    assert_eq!(rows[0]["kind"], "lightningAddressRequest");
    assert_eq!(rows[1]["code"], 1001);
    assert_eq!(rows[2]["kind"], "unrecognized");
}

#[test]
fn batch_without_code_column_is_rejected() {
    let mut csv_file = NamedTempFile::new().expect("failed to create temp csv");
    writeln!(csv_file, "address,amount").expect("failed to write csv header");
    writeln!(csv_file, "bc1q,1").expect("failed to write csv row");
    csv_file.flush().expect("failed to flush csv");

    let path = csv_file.path().to_str().expect("temp path should be UTF-8");
    let output = run_agent(&["classify-batch", path]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_batch_file_is_an_io_error() {
    let output = run_agent(&["classify-batch", "/definitely/not/here.csv"]);
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(parse_agent_error(&output)["error"], "io_error");
}
