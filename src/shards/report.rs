use super::{analyze_shard_distribution, ShardStatsMap};

pub const EMPTY_REPORT: &str = "No shard statistics available";

/// Renders `1234567` as `1,234,567`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Formats an average already rounded to two places, keeping at least one
/// decimal digit: `100.0`, `1,234.5`, `33.33`.
fn format_average(value: f64, grouped: bool) -> String {
    let fixed = format!("{:.2}", value);
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "0"));
    let fraction = match fraction.trim_end_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let whole = match (grouped, whole.parse::<u64>()) {
        (true, Ok(n)) => group_thousands(n),
        _ => whole.to_string(),
    };
    format!("{}.{}", whole, fraction)
}

/// Human-readable shard statistics report.
///
/// The analysis is recomputed from `shard_stats`; the per-shard breakdown is
/// listed by ascending shard id.
pub fn generate_shard_report(shard_stats: &ShardStatsMap) -> String {
    let analysis = analyze_shard_distribution(shard_stats);
    let (Some(summary), Some(dist), Some(insights)) =
        (analysis.summary, analysis.distribution, analysis.insights)
    else {
        return EMPTY_REPORT.to_string();
    };

    let mut report = vec![
        "📊 SHARD STATISTICS REPORT".to_string(),
        "=".repeat(40),
        format!("🎯 Total Shards: {}", summary.total_shards),
        format!("🏢 Total Servers: {}", group_thousands(summary.total_servers)),
        format!("👥 Total Users: {}", group_thousands(summary.total_users)),
        format!(
            "📈 Avg Servers/Shard: {}",
            format_average(summary.avg_servers_per_shard, false)
        ),
        format!(
            "📈 Avg Users/Shard: {}",
            format_average(summary.avg_users_per_shard, true)
        ),
        String::new(),
        "📊 DISTRIBUTION".to_string(),
        "-".repeat(20),
        format!("🔻 Min Servers: {}", dist.min_servers),
        format!("🔺 Max Servers: {}", dist.max_servers),
        format!("🔻 Min Users: {}", group_thousands(dist.min_users)),
        format!("🔺 Max Users: {}", group_thousands(dist.max_users)),
        String::new(),
        "💡 INSIGHTS".to_string(),
        "-".repeat(20),
        format!("🏆 Most Loaded Shard: {}", insights.most_loaded_shard),
        format!("💤 Least Loaded Shard: {}", insights.least_loaded_shard),
        format!("⚖️ Balance Status: {}", insights.balance_recommendation),
        String::new(),
        "📋 PER-SHARD BREAKDOWN".to_string(),
        "-".repeat(20),
    ];

    report.extend(shard_stats.iter().map(|(shard_id, stats)| {
        format!(
            "Shard {}: {} servers, {} users",
            shard_id,
            group_thousands(stats.servers),
            group_thousands(stats.users)
        )
    }));

    report.join("\n")
}
