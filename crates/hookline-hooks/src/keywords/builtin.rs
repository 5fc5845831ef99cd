use super::{KeywordEntry, SynergyEntry};

pub(super) fn keywords() -> Vec<KeywordEntry> {
    vec![
        KeywordEntry::canonical(
            "ultrawork",
            "Maximum-throughput execution with parallel agents",
            "[ULTRAWORK] Work at full throughput: split the task into independent pieces, \
             run them with parallel agents and do not stop until every piece is finished.",
        )
        .with_flags(["parallel-agents", "persist-until-done"])
        .with_mode("ultrawork"),
        KeywordEntry::alias("ulw", "ultrawork"),
        KeywordEntry::canonical(
            "ultrathink",
            "Extended reasoning before acting",
            "[ULTRATHINK] Think deeply before acting: enumerate approaches, weigh trade-offs \
             and check edge cases before touching code.",
        )
        .with_flags(["extended-thinking"]),
        KeywordEntry::alias("think-hard", "ultrathink"),
        KeywordEntry::canonical(
            "ralph",
            "Self-referential loop that keeps going until verified done",
            "[RALPH] Keep iterating on the task until it is verifiably complete: after each \
             pass, re-check the result against the request and continue if anything is missing.",
        )
        .with_flags(["persist-until-done", "self-verify"])
        .with_mode("ralph"),
        KeywordEntry::canonical(
            "autopilot",
            "Autonomous end-to-end execution",
            "[AUTOPILOT] Drive the task end to end without asking for confirmation on routine \
             decisions; verify the outcome before reporting back.",
        )
        .with_flags(["autonomous", "self-verify"])
        .with_mode("autopilot"),
        KeywordEntry::canonical(
            "search",
            "Exhaustive codebase search",
            "[SEARCH] Search exhaustively: look in every plausible location and report all \
             matches, not just the first.",
        )
        .with_flags(["exhaustive-search"]),
        KeywordEntry::alias("find-all", "search"),
        KeywordEntry::canonical(
            "analyze",
            "Root-cause analysis",
            "[ANALYZE] Investigate before changing anything: gather evidence, trace the root \
             cause and explain it.",
        )
        .with_flags(["deep-analysis"]),
        KeywordEntry::alias("investigate", "analyze"),
        KeywordEntry::canonical(
            "plan",
            "Plan first, then execute",
            "[PLAN] Produce a short step-by-step plan and confirm it covers the request before \
             implementing.",
        )
        .with_flags(["plan-first"])
        .with_mode("planning"),
    ]
}

pub(super) fn synergies() -> Vec<SynergyEntry> {
    vec![
        SynergyEntry::new(
            ["ultrawork", "ultrathink"],
            "[ULTRAWORK + ULTRATHINK] Reason through the design up front, then fan the work out \
             to parallel agents and keep going until everything is done.",
        )
        .with_mode("ultrawork"),
        SynergyEntry::new(
            ["autopilot", "plan"],
            "[AUTOPILOT + PLAN] Write the plan first, then execute it end to end without \
             pausing, checking each step off as it is verified.",
        )
        .with_mode("autopilot"),
        SynergyEntry::new(
            ["search", "analyze"],
            "[SEARCH + ANALYZE] Collect every relevant occurrence first, then analyze them \
             together to find the root cause.",
        ),
    ]
}
