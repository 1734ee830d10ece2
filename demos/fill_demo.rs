//! Fill a self-contained demo form and auto-submit it.
//!
//! Run with: cargo run --example fill_demo

use std::collections::HashMap;

use formpilot::controller::{operator_channel, SubmissionController};
use formpilot::{AnswerValue, FieldDescriptor, FieldKind, FormPilot};
use tokio_util::sync::CancellationToken;

const DEMO_FORM: &str = r#"<html><body><form>
    <label for="full_name">Full Name</label><input id="full_name">
    <label for="essay">Why do you want to work here</label><textarea id="essay"></textarea>
    <label for="state">State</label>
    <select id="state"><option>Massachusetts</option><option>New York</option></select>
    <button type="button" onclick="document.body.innerHTML = '<h1>Thank you for applying!</h1>'">Submit Application</button>
</form></body></html>"#;

#[tokio::main]
async fn main() -> formpilot::Result<()> {
    tracing_subscriber::fmt::init();

    let browser = FormPilot::builder().headless(true).build().await?;
    let page = browser.new_page().await?;

    let fields = vec![
        FieldDescriptor {
            title: "Full Name".into(),
            path: "full_name".into(),
            kind: FieldKind::Text,
            required: true,
            description: None,
            options: None,
        },
        FieldDescriptor {
            title: "Why do you want to work here".into(),
            path: "essay".into(),
            kind: FieldKind::LongText,
            required: false,
            description: None,
            options: None,
        },
        FieldDescriptor {
            title: "State".into(),
            path: "state".into(),
            kind: FieldKind::ValueSelect,
            required: true,
            description: None,
            options: Some(vec!["Massachusetts".into(), "New York".into()]),
        },
    ];

    let mut answers = HashMap::new();
    answers.insert("full_name".into(), AnswerValue::Text("Ada Lovelace".into()));
    answers.insert(
        "essay".into(),
        AnswerValue::Text("I build analytical engines and enjoy hard automation problems.".into()),
    );
    answers.insert("state".into(), AnswerValue::Choice("Massachusetts".into()));

    let (_operator, mut feed) = operator_channel();
    let cancel = CancellationToken::new();

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let output = controller
        .run(
            &format!("data:text/html,{DEMO_FORM}"),
            &fields,
            &answers,
            &mut feed,
            &cancel,
        )
        .await;

    println!("outcome: {:?} — {}", output.outcome.status, output.outcome.message);
    for result in output.report.results() {
        println!("  {:<12} {:?} {}", result.path, result.status,
            result.detail.as_deref().unwrap_or(""));
    }

    browser.close().await?;
    Ok(())
}
