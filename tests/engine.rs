//! Live-browser tests driving the engine against inline `data:` URL fixtures.
//! They need a Chromium binary on the machine, so they are ignored by default:
//!
//!     cargo test -- --ignored

use std::collections::HashMap;
use std::time::Duration;

use formpilot::behavior::BehaviorSimulator;
use formpilot::controller::{operator_channel, SubmissionController};
use formpilot::fill::FieldFiller;
use formpilot::locator;
use formpilot::{
    AnswerValue, BehaviorProfile, FieldDescriptor, FieldKind, FillStatus, FormPilot, Page,
    SubmissionStatus, SubmitMode,
};
use tokio_util::sync::CancellationToken;

/// Behavior profile with the theatrics turned off so tests assert outcomes,
/// not timings.
fn calm_profile() -> BehaviorProfile {
    BehaviorProfile {
        typo_probability: 0.0,
        defer_probability: 0.0,
        reread_probability: 0.0,
        pointer_click_probability: 0.0,
        shuffle_fields: false,
        keystroke_delay_ms: (1, 3),
    }
}

async fn launch() -> FormPilot {
    FormPilot::builder()
        .headless(true)
        .navigation_timeout(Duration::from_secs(10))
        .settle_timeout(Duration::from_secs(3))
        .selector_timeout(Duration::from_secs(2))
        .behavior(calm_profile())
        .build()
        .await
        .expect("Failed to launch browser")
}

async fn open(browser: &FormPilot, html: &str) -> Page {
    let page = browser.new_page().await.expect("Failed to open page");
    page.goto(&format!("data:text/html,{html}"))
        .await
        .expect("Failed to load fixture");
    page.wait_for_settle(Duration::from_secs(3))
        .await
        .expect("Failed to settle");
    page
}

fn field(title: &str, path: &str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor {
        title: title.into(),
        path: path.into(),
        kind,
        required: true,
        description: None,
        options: None,
    }
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn exact_attribute_tier_preempts_label_tiers() {
    let browser = launch().await;
    // The label sits next to a decoy input; only the exact-id tier finds the
    // real control. If the cascade order regressed, the decoy would win.
    let page = open(
        &browser,
        r#"<html><body>
            <label>Favorite Color</label><input id="decoy">
            <input id="favorite_color">
        </body></html>"#,
    )
    .await;

    let descriptor = field("Favorite Color", "favorite_color", FieldKind::Text);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");
    assert_eq!(
        el.get_attribute("id").await.expect("no id").as_deref(),
        Some("favorite_color")
    );
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn locator_returns_none_when_cascade_is_exhausted() {
    let browser = launch().await;
    let page = open(&browser, "<html><body><p>Nothing here</p></body></html>").await;

    let descriptor = field("Desired Salary", "desired_salary", FieldKind::Text);
    let found = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed");
    assert!(found.is_none());
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn boolean_true_clicks_exactly_one_yes_affordance() {
    let browser = launch().await;
    let page = open(
        &browser,
        r#"<html><body><div>
            <p>Are you authorized to work in the US?</p>
            <input type="radio" id="work_auth" name="work_auth">
            <div>
                <button type="button" onclick="this.dataset.hits = String((parseInt(this.dataset.hits || '0') + 1))">Yes</button>
                <button type="button" onclick="this.dataset.hits = String((parseInt(this.dataset.hits || '0') + 1))">No</button>
            </div>
        </div></body></html>"#,
    )
    .await;

    let descriptor = field(
        "Are you authorized to work in the US?",
        "work_auth",
        FieldKind::Boolean,
    );
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(&mut behavior, &descriptor, &el, &AnswerValue::Flag(true))
        .await;
    assert_eq!(result.status, FillStatus::Filled);

    let hits = page
        .evaluate_string(
            r#"JSON.stringify(Array.from(document.querySelectorAll('button')).map(b => b.dataset.hits || ''))"#,
        )
        .await
        .expect("eval failed");
    assert_eq!(hits, r#"["1",""]"#, "exactly one Yes click, zero No clicks");
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn value_select_picks_exact_option_text() {
    let browser = launch().await;
    let page = open(
        &browser,
        r#"<html><body>
            <label for="state">State</label>
            <select id="state"><option>Massachusetts</option><option>New York</option></select>
        </body></html>"#,
    )
    .await;

    let mut descriptor = field("State", "state", FieldKind::ValueSelect);
    descriptor.options = Some(vec!["Massachusetts".into(), "New York".into()]);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(
            &mut behavior,
            &descriptor,
            &el,
            &AnswerValue::Choice("Massachusetts".into()),
        )
        .await;
    assert_eq!(result.status, FillStatus::Filled);

    let selected = page
        .evaluate_string("document.getElementById('state').selectedOptions[0].text")
        .await
        .expect("eval failed");
    assert_eq!(selected, "Massachusetts");
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn value_select_falls_back_to_first_option() {
    let browser = launch().await;
    let page = open(
        &browser,
        r#"<html><body>
            <label for="state">State</label>
            <select id="state"><option>Massachusetts</option><option>New York</option></select>
        </body></html>"#,
    )
    .await;

    let descriptor = field("State", "state", FieldKind::ValueSelect);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(
            &mut behavior,
            &descriptor,
            &el,
            &AnswerValue::Choice("California".into()),
        )
        .await;
    assert_eq!(result.status, FillStatus::Filled);
    assert!(result.detail.is_some(), "fallback should be surfaced");

    let selected = page
        .evaluate_string("document.getElementById('state').selectedOptions[0].text")
        .await
        .expect("eval failed");
    assert_eq!(selected, "Massachusetts");
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn multi_select_checks_exactly_the_requested_subset() {
    let browser = launch().await;
    // "Go" starts checked and is not requested; it must end unchecked.
    let page = open(
        &browser,
        r#"<html><body><fieldset>
            <legend>Languages</legend>
            <label><input type="checkbox" value="Rust">Rust</label>
            <label><input type="checkbox" value="Go" checked>Go</label>
            <label><input type="checkbox" value="Python">Python</label>
        </fieldset></body></html>"#,
    )
    .await;

    let descriptor = field("Languages", "languages", FieldKind::MultiValueSelect);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(
            &mut behavior,
            &descriptor,
            &el,
            &AnswerValue::Choices(vec!["Rust".into(), "Python".into()]),
        )
        .await;
    assert_eq!(result.status, FillStatus::Filled);

    let checked = page
        .evaluate_string(
            r#"JSON.stringify(Array.from(document.querySelectorAll('input:checked')).map(i => i.value))"#,
        )
        .await
        .expect("eval failed");
    assert_eq!(checked, r#"["Rust","Python"]"#);
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn long_text_read_back_is_within_slack() {
    let browser = launch().await;
    let page = open(
        &browser,
        r#"<html><body>
            <label for="essay">Why do you want to work here</label>
            <textarea id="essay"></textarea>
        </body></html>"#,
    )
    .await;

    let descriptor = field("Why do you want to work here", "essay", FieldKind::LongText);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let answer = "I have shipped browser automation at scale for five years and \
                  your posting reads like the problems I already enjoy solving daily.";
    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(
            &mut behavior,
            &descriptor,
            &el,
            &AnswerValue::Text(answer.into()),
        )
        .await;
    assert_eq!(result.status, FillStatus::Filled);

    let value = el.value().await.expect("read-back failed");
    assert!(
        value.chars().count() + 10 >= answer.chars().count(),
        "read back {} of {} chars",
        value.chars().count(),
        answer.chars().count()
    );
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn location_field_retains_typed_city() {
    let browser = launch().await;
    let page = open(
        &browser,
        r#"<html><body>
            <p>Location</p>
            <input placeholder="Start typing..." id="loc">
        </body></html>"#,
    )
    .await;

    let descriptor = field("Location", "location", FieldKind::Location);
    let el = locator::locate(&page, &descriptor)
        .await
        .expect("locate failed")
        .expect("no element resolved");

    let mut behavior = BehaviorSimulator::with_seed(calm_profile(), 1);
    let mut filler = FieldFiller::new(&page, None);
    let result = filler
        .fill(
            &mut behavior,
            &descriptor,
            &el,
            &AnswerValue::Text("Boston, MA".into()),
        )
        .await;
    assert_eq!(result.status, FillStatus::Filled);

    let value = el.value().await.expect("read-back failed");
    assert!(!value.is_empty());
    assert!(value.contains("Boston"), "value was: {value}");
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn unreachable_url_fails_after_bounded_retries() {
    let browser = FormPilot::builder()
        .headless(true)
        .navigation_timeout(Duration::from_secs(3))
        .navigation_retries(3)
        .settle_timeout(Duration::from_secs(1))
        .selector_timeout(Duration::from_secs(1))
        .behavior(calm_profile())
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page().await.expect("Failed to open page");

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let (_handle, mut feed) = operator_channel();
    let cancel = CancellationToken::new();

    let output = controller
        .run(
            "http://127.0.0.1:9/unreachable",
            &[],
            &HashMap::new(),
            &mut feed,
            &cancel,
        )
        .await;

    assert_eq!(output.outcome.status, SubmissionStatus::Failed);
    assert!(
        output.outcome.message.contains("3 attempts"),
        "message was: {}",
        output.outcome.message
    );
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn auto_submit_classifies_confirmation_page() {
    let browser = launch().await;
    let page = browser.new_page().await.expect("Failed to open page");

    let html = r#"<html><body><form>
        <label for="full_name">Full Name</label><input id="full_name">
        <button type="button" onclick="document.body.innerHTML = '<h1>Thank you for applying!</h1>'">Submit Application</button>
    </form></body></html>"#;

    let fields = vec![field("Full Name", "full_name", FieldKind::Text)];
    let mut answers = HashMap::new();
    answers.insert(
        "full_name".to_string(),
        AnswerValue::Text("Ada Lovelace".into()),
    );

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let (_handle, mut feed) = operator_channel();
    let cancel = CancellationToken::new();

    let output = controller
        .run(
            &format!("data:text/html,{html}"),
            &fields,
            &answers,
            &mut feed,
            &cancel,
        )
        .await;

    assert_eq!(output.outcome.status, SubmissionStatus::Submitted);
    assert_eq!(output.report.filled(), 1);
    assert!(output.artifacts.pre_submit_png.is_some());
    assert!(
        controller
            .trail()
            .contains(&formpilot::controller::Phase::FieldsFilled),
        "Submitted must be downstream of FieldsFilled"
    );
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn manual_mode_waits_for_operator_acknowledgement() {
    let browser = FormPilot::builder()
        .headless(true)
        .submit_mode(SubmitMode::Manual)
        .settle_timeout(Duration::from_secs(2))
        .selector_timeout(Duration::from_secs(1))
        .behavior(calm_profile())
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page().await.expect("Failed to open page");

    let html = r#"<html><body><form>
        <label for="full_name">Full Name</label><input id="full_name">
    </form></body></html>"#;

    let fields = vec![field("Full Name", "full_name", FieldKind::Text)];
    let mut answers = HashMap::new();
    answers.insert(
        "full_name".to_string(),
        AnswerValue::Text("Ada Lovelace".into()),
    );

    let (handle, mut feed) = operator_channel();
    let cancel = CancellationToken::new();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.acknowledge().await;
    });

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let output = controller
        .run(
            &format!("data:text/html,{html}"),
            &fields,
            &answers,
            &mut feed,
            &cancel,
        )
        .await;

    assert_eq!(output.outcome.status, SubmissionStatus::ManualSubmit);
}

#[tokio::test]
#[ignore = "requires a local Chromium binary"]
async fn cancellation_ends_manual_review_deterministically() {
    let browser = FormPilot::builder()
        .headless(true)
        .submit_mode(SubmitMode::Manual)
        .settle_timeout(Duration::from_secs(2))
        .selector_timeout(Duration::from_secs(1))
        .behavior(calm_profile())
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page().await.expect("Failed to open page");

    let html = r#"<html><body><form>
        <label for="full_name">Full Name</label><input id="full_name">
    </form></body></html>"#;

    let fields = vec![field("Full Name", "full_name", FieldKind::Text)];
    let mut answers = HashMap::new();
    answers.insert(
        "full_name".to_string(),
        AnswerValue::Text("Ada Lovelace".into()),
    );

    let (_handle, mut feed) = operator_channel();
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let mut controller = SubmissionController::new(&page, browser.config(), None);
    let output = controller
        .run(
            &format!("data:text/html,{html}"),
            &fields,
            &answers,
            &mut feed,
            &cancel,
        )
        .await;

    assert_eq!(output.outcome.status, SubmissionStatus::Failed);
    assert!(output.outcome.message.contains("cancelled"));

    browser.close().await.expect("Failed to close browser");
}
