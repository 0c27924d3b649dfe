use super::MetricsCollector;

pub struct GuardMonitor {
    collector: MetricsCollector,
}

impl GuardMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let connection = self.collector.connection_snapshot();

        let mut report = String::from("=== FrameGuard Metrics ===\n");
        report.push_str(&format!(
            "\n[background]\n  Submitted: {} channel, {} stateless ({} after write failure)\n  Stateless failures: {}\n  Scores: {} routed, {} broadcast\n  Malformed replies: {}\n  Reconnects scheduled: {}\n  Expired correlations: {}\n",
            connection.channel_submissions,
            connection.stateless_submissions,
            connection.fallbacks,
            connection.stateless_failures,
            connection.routed_scores,
            connection.broadcasts,
            connection.malformed_replies,
            connection.reconnects_scheduled,
            connection.expired_correlations,
        ));

        let pages = self.collector.page_snapshots();
        if pages.is_empty() {
            report.push_str("\nNo pages registered\n");
            return report;
        }

        for page in pages {
            report.push_str(&format!(
                "\n[{}]\n  Frames: {} sampled, {} skipped\n  Scores: {} received\n  Danger: {}\n",
                page.page_id,
                page.frames_sampled,
                page.captures_skipped,
                page.scores_received,
                if page.danger_updates > 0 {
                    format!(
                        "{} update{}",
                        page.danger_updates,
                        if page.danger_updates == 1 { "" } else { "s" }
                    )
                } else {
                    "none".to_string()
                }
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
