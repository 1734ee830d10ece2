use std::collections::HashSet;
use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::BehaviorProfile;
use crate::element::Element;
use crate::error::Result;
use crate::model::{FieldDescriptor, FieldKind};
use crate::page::Page;

const TYPO_POOL: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Interposes randomized, human-plausible pacing and movement around every
/// interaction. All randomness lives behind this API; functional code only
/// observes outcomes, never timings or paths.
pub struct BehaviorSimulator {
    profile: BehaviorProfile,
    rng: SmallRng,
}

impl BehaviorSimulator {
    pub fn new(profile: BehaviorProfile) -> Self {
        Self {
            profile,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(profile: BehaviorProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    // ── Pointer movement ────────────────────────────────────────────

    /// Move the pointer along a cubic-Bezier path between two randomized
    /// viewport points, occasionally ending in a click or a scroll.
    pub async fn wander(&mut self, page: &Page) -> Result<()> {
        let (width, height) = page.viewport();
        let (w, h) = (width as f64, height as f64);

        let start = (self.rng.gen_range(0.0..w), self.rng.gen_range(0.0..h));
        let end = (self.rng.gen_range(0.0..w), self.rng.gen_range(0.0..h));
        let c1 = (
            start.0 + self.rng.gen_range(-100.0..100.0),
            start.1 + self.rng.gen_range(-100.0..100.0),
        );
        let c2 = (
            end.0 + self.rng.gen_range(-100.0..100.0),
            end.1 + self.rng.gen_range(-100.0..100.0),
        );

        let steps = self.rng.gen_range(15..=40);
        for step in 0..steps {
            let t = step as f64 / steps as f64;
            let (x, y) = bezier_point(start, c1, c2, end, t);
            page.mouse_move(x.clamp(0.0, w - 1.0), y.clamp(0.0, h - 1.0))
                .await?;
            self.sleep_ms(5, 20).await;
        }

        if self.rng.gen_bool(0.5) {
            let y = self.rng.gen_range(0.0..h);
            page.scroll_to(y).await?;
        }
        let click_p = self.profile.pointer_click_probability.clamp(0.0, 1.0);
        if click_p > 0.0 && self.rng.gen_bool(click_p) {
            page.mouse_click(end.0.clamp(0.0, w - 1.0), end.1.clamp(0.0, h - 1.0))
                .await?;
        }
        self.sleep_ms(100, 400).await;
        Ok(())
    }

    // ── Typing ──────────────────────────────────────────────────────

    /// Type character by character with randomized inter-key delay. With a
    /// small probability a wrong character goes in first, followed by a
    /// Backspace and the correction.
    pub async fn human_type(&mut self, element: &Element, text: &str) -> Result<()> {
        let (lo, hi) = self.profile.keystroke_delay_ms;
        let mut since_pause = 0u32;
        for ch in text.chars() {
            let typo_p = self.profile.typo_probability.clamp(0.0, 1.0);
            if ch.is_ascii_alphanumeric() && self.rng.gen_bool(typo_p) {
                let wrong = TYPO_POOL[self.rng.gen_range(0..TYPO_POOL.len())] as char;
                element.type_text(&wrong.to_string()).await?;
                self.sleep_ms(100, 300).await;
                element.press_key("Backspace").await?;
                self.sleep_ms(50, 150).await;
            }
            element.type_text(&ch.to_string()).await?;
            self.sleep_ms(lo, hi).await;

            // Occasional mid-word hesitation.
            since_pause += 1;
            if since_pause >= self.rng.gen_range(4..=8) && self.rng.gen_bool(0.25) {
                self.sleep_ms(200, 600).await;
                since_pause = 0;
            }
        }
        Ok(())
    }

    // ── Field pacing ────────────────────────────────────────────────

    /// Context-aware pause after a field: essay-style fields get the longest
    /// think time, boolean/file the shortest, selects sit in between. Bounded
    /// jitter on top, floored at 200ms.
    pub fn settle_duration(&mut self, field: &FieldDescriptor, value: &str) -> Duration {
        let base: i64 = match field.kind {
            FieldKind::LongText => 800 + 2 * value.len() as i64,
            FieldKind::ValueSelect | FieldKind::MultiValueSelect => 600,
            FieldKind::Boolean => 300,
            FieldKind::File => 500,
            FieldKind::Location => 700,
            FieldKind::Text | FieldKind::Date => {
                let title = field.title.to_lowercase();
                if ["experience", "why", "describe", "explain"]
                    .iter()
                    .any(|w| title.contains(w))
                {
                    1000
                } else if value.len() > 100 {
                    600
                } else {
                    400
                }
            }
        };
        let jitter = self.rng.gen_range(-200..=400);
        let ms = (base + jitter).max(200) as u64;
        // Essay pauses scale with length but stay bounded.
        Duration::from_millis(ms.min(4000))
    }

    pub async fn settle_after(&mut self, field: &FieldDescriptor, value: &str) {
        let pause = self.settle_duration(field, value);
        trace!(path = %field.path, ?pause, "settling");
        tokio::time::sleep(pause).await;
    }

    /// Low-probability upward re-scroll to simulate re-reading previously
    /// filled content, then return to the prior position. Only kicks in once
    /// a few fields have been filled.
    pub async fn maybe_reread(&mut self, page: &Page, fields_done: usize) -> Result<()> {
        let reread_p = self.profile.reread_probability.clamp(0.0, 1.0);
        if fields_done < 3 || !self.rng.gen_bool(reread_p) {
            return Ok(());
        }
        let current = page.scroll_y().await?;
        let back = self.rng.gen_range(200.0..600.0);
        page.scroll_to((current - back).max(0.0)).await?;
        self.sleep_ms(800, 2000).await;
        page.scroll_to(current).await?;
        self.sleep_ms(300, 700).await;
        Ok(())
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Visit order for the fields of one attempt, shuffled when the profile
    /// asks for it.
    pub fn plan(&mut self, field_count: usize) -> FieldQueue {
        let mut order: Vec<usize> = (0..field_count).collect();
        if self.profile.shuffle_fields {
            order.shuffle(&mut self.rng);
        }
        FieldQueue::new(order)
    }

    /// Whether to put the current field off until the end of the queue.
    pub fn should_defer(&mut self) -> bool {
        let p = self.profile.defer_probability.clamp(0.0, 1.0);
        p > 0.0 && self.rng.gen_bool(p)
    }

    async fn sleep_ms(&mut self, lo: u64, hi: u64) {
        let ms = self.rng.gen_range(lo..=hi);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Cubic Bezier interpolation between `p0` and `p3`.
fn bezier_point(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    t: f64,
) -> (f64, f64) {
    let u = 1.0 - t;
    let x = u.powi(3) * p0.0
        + 3.0 * u.powi(2) * t * p1.0
        + 3.0 * u * t.powi(2) * p2.0
        + t.powi(3) * p3.0;
    let y = u.powi(3) * p0.1
        + 3.0 * u.powi(2) * t * p1.1
        + 3.0 * u * t.powi(2) * p2.1
        + t.powi(3) * p3.1;
    (x, y)
}

/// Explicit append-on-defer work queue. A field may be deferred at most once;
/// the second visit must fill it. Keeping this separate from the randomness
/// makes the scheduling policy testable on its own.
pub struct FieldQueue {
    queue: VecDeque<usize>,
    deferred: HashSet<usize>,
}

impl FieldQueue {
    fn new(order: Vec<usize>) -> Self {
        Self {
            queue: order.into(),
            deferred: HashSet::new(),
        }
    }

    pub fn next(&mut self) -> Option<usize> {
        self.queue.pop_front()
    }

    /// Re-enqueue a field at the back. Returns false (and drops the request)
    /// when the field has already been deferred once.
    pub fn defer(&mut self, index: usize) -> bool {
        if self.deferred.insert(index) {
            self.queue.push_back(index);
            true
        } else {
            false
        }
    }

    pub fn was_deferred(&self, index: usize) -> bool {
        self.deferred.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(title: &str) -> FieldDescriptor {
        FieldDescriptor {
            title: title.into(),
            path: "p".into(),
            kind: FieldKind::Text,
            required: false,
            description: None,
            options: None,
        }
    }

    #[test]
    fn queue_defers_each_field_at_most_once() {
        let mut queue = FieldQueue::new(vec![0, 1, 2]);
        assert_eq!(queue.next(), Some(0));
        assert!(queue.defer(0));
        assert_eq!(queue.next(), Some(1));
        assert_eq!(queue.next(), Some(2));
        assert_eq!(queue.next(), Some(0));
        assert!(!queue.defer(0), "second defer must be refused");
        assert!(queue.is_empty());
    }

    #[test]
    fn plan_without_shuffle_keeps_document_order() {
        let profile = BehaviorProfile {
            shuffle_fields: false,
            ..BehaviorProfile::default()
        };
        let mut sim = BehaviorSimulator::with_seed(profile, 7);
        let mut queue = sim.plan(4);
        let order: Vec<usize> = std::iter::from_fn(|| queue.next()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn plan_with_shuffle_visits_every_field_once() {
        let mut sim = BehaviorSimulator::with_seed(BehaviorProfile::default(), 42);
        let mut queue = sim.plan(10);
        let mut seen: Vec<usize> = std::iter::from_fn(|| queue.next()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn settle_duration_is_bounded_and_context_aware() {
        let mut sim = BehaviorSimulator::with_seed(BehaviorProfile::default(), 1);
        let quick = text_field("First name");
        let slow = text_field("Why do you want this role?");

        for _ in 0..100 {
            let d = sim.settle_duration(&quick, "Ada");
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(4000));
        }
        // Interrogative essay-style titles pause longer on average.
        let avg = |sim: &mut BehaviorSimulator, f: &FieldDescriptor| -> u128 {
            (0..200)
                .map(|_| sim.settle_duration(f, "answer").as_millis())
                .sum::<u128>()
                / 200
        };
        let quick_avg = avg(&mut sim, &quick);
        let slow_avg = avg(&mut sim, &slow);
        assert!(slow_avg > quick_avg);
    }

    #[test]
    fn bezier_hits_its_endpoints() {
        let p0 = (10.0, 20.0);
        let p3 = (300.0, 400.0);
        let (x0, y0) = bezier_point(p0, (0.0, 0.0), (500.0, 500.0), p3, 0.0);
        assert!((x0 - 10.0).abs() < f64::EPSILON && (y0 - 20.0).abs() < f64::EPSILON);
        let (x1, y1) = bezier_point(p0, (0.0, 0.0), (500.0, 500.0), p3, 1.0);
        assert!((x1 - 300.0).abs() < f64::EPSILON && (y1 - 400.0).abs() < f64::EPSILON);
    }
}
