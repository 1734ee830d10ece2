//! Fill a live job posting, then hold for a human to click submit.
//!
//! Run with: cargo run --example manual_review -- <job-url>

use std::collections::HashMap;

use formpilot::controller::{operator_channel, SubmissionController};
use formpilot::{AnswerValue, FieldDescriptor, FieldKind, FormPilot, SubmitMode};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> formpilot::Result<()> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/forms/post".to_string());

    let browser = FormPilot::builder()
        .headless(false)
        .submit_mode(SubmitMode::Manual)
        .build()
        .await?;
    let page = browser.new_page().await?;

    let fields = vec![FieldDescriptor {
        title: "Customer name".into(),
        path: "custname".into(),
        kind: FieldKind::Text,
        required: true,
        description: None,
        options: None,
    }];
    let mut answers = HashMap::new();
    answers.insert("custname".into(), AnswerValue::Text("Ada Lovelace".into()));

    let (operator, mut feed) = operator_channel();
    let cancel = CancellationToken::new();

    // Press ENTER once the form has been reviewed and submitted by hand.
    tokio::spawn(async move {
        let _ = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)
        })
        .await;
        operator.acknowledge().await;
    });

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let output = controller
        .run(&url, &fields, &answers, &mut feed, &cancel)
        .await;

    println!("outcome: {:?} — {}", output.outcome.status, output.outcome.message);

    browser.close().await?;
    Ok(())
}
