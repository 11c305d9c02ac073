use super::*;

fn policy() -> StylePolicy {
    StylePolicy {
        active_voice: true,
        tense: Some("present".to_string()),
        forbidden: vec!["simply".to_string(), "obviously".to_string()],
        sentence_max: 12,
    }
}

fn assert_idempotent(doc: &str, policy: &StylePolicy) -> String {
    let once = normalize(doc, policy);
    let twice = normalize(&once, policy);
    assert_eq!(once, twice, "second pass changed the document");
    once
}

#[test]
fn empty_and_whitespace_documents_normalize_to_empty() {
    assert_eq!(normalize("", &policy()), "");
    assert_eq!(normalize(" \n\n\t\n", &policy()), "");
}

#[test]
fn default_policy_only_tidies_layout() {
    let doc = "Plain text.   \n\n\n\nMore text.";
    assert_eq!(
        normalize(doc, &StylePolicy::default()),
        "Plain text.\n\nMore text.\n"
    );
}

#[test]
fn headings_become_sentence_case_and_keep_acronyms() {
    let doc = "# Backup And Restore API Guide\n\n## Managing User IDs\n";
    assert_eq!(
        normalize(doc, &policy()),
        "# Backup and restore API guide\n\n## Managing user IDs\n"
    );
}

#[test]
fn passive_voice_is_rewritten_with_agent_first() {
    assert_eq!(
        passive_to_active("The report is generated by the scheduler."),
        "The scheduler generates the report."
    );
    assert_eq!(
        passive_to_active("The backups were created by the operators."),
        "The operators created the backups."
    );
    assert_eq!(
        passive_to_active("The tokens are revoked by admins, then rotated."),
        "Admins revoke the tokens, then rotated."
    );
    assert_eq!(
        passive_to_active("The request is processed by the gateway."),
        "The gateway processes the request."
    );
}

#[test]
fn passive_rewrite_leaves_other_sentences_alone() {
    let text = "Nothing passive here. The file is created by the job.";
    assert_eq!(
        passive_to_active(text),
        "Nothing passive here. The job creates the file."
    );
}

#[test]
fn future_tense_becomes_present() {
    assert_eq!(future_to_present("The job will run nightly."), "The job run nightly.");
    assert_eq!(future_to_present("Will start at noon."), "Start at noon.");
    assert_eq!(future_to_present("willow trees"), "willow trees");
}

#[test]
fn forbidden_terms_are_removed_on_token_boundaries() {
    let rules = StyleRules::new(&policy());
    assert_eq!(
        scrub_forbidden("Simply run the tool, obviously .", &rules.forbidden),
        "run the tool,."
    );
    assert_eq!(
        scrub_forbidden("Simplymatic stays.", &rules.forbidden),
        "Simplymatic stays."
    );
}

#[test]
fn long_sentences_split_at_first_clause_boundary() {
    let text = "The restore job copies every snapshot to the standby region, then it verifies each checksum before reporting.";
    let once = split_long_sentences(text, 12);
    assert_eq!(
        once,
        "The restore job copies every snapshot to the standby region. Then it verifies each checksum before reporting."
    );
    assert_eq!(split_long_sentences(&once, 12), once);
}

#[test]
fn long_sentence_without_boundary_is_kept() {
    let text = "one two three four five six seven eight nine ten eleven twelve thirteen";
    assert_eq!(split_long_sentences(text, 5), text);
}

#[test]
fn fenced_blocks_pass_through_byte_for_byte() {
    let fence = "```yaml\nkey: value   \nsimply: will be   \n\n\n\n```";
    let doc = format!("Intro text.\n\n{fence}\n\nOutro.\n");
    let out = normalize(&doc, &policy());
    assert!(out.contains(fence), "fence altered: {out}");
}

#[test]
fn unclosed_fence_runs_to_end_of_document() {
    let doc = "Intro.\n~~~\nsimply   \nwill stay\n";
    let out = assert_idempotent(doc, &policy());
    assert_eq!(out, "Intro.\n~~~\nsimply   \nwill stay\n");
}

#[test]
fn inline_code_and_links_are_locked() {
    let doc = "Run `simply --will go` or see [obviously here](https://x.test/simply) simply.\n";
    let out = normalize(doc, &policy());
    assert_eq!(
        out,
        "Run `simply --will go` or see [obviously here](https://x.test/simply).\n"
    );
}

#[test]
fn list_and_table_lines_are_scrub_only() {
    let doc = "- The file is created by the job, simply.\n| will go | obviously |\n";
    assert_eq!(
        normalize(doc, &policy()),
        "- The file is created by the job,.\n| will go | |\n"
    );
}

#[test]
fn metadata_block_is_untouched() {
    let doc = "---\ntitle: Will Be Simply Kept   \ntags: [api-reference]\n---\n# A Title\n";
    let out = normalize(doc, &policy());
    assert!(out.starts_with("---\ntitle: Will Be Simply Kept   \ntags: [api-reference]\n---\n"));
    assert!(out.ends_with("# A title\n"));
}

#[test]
fn metadata_only_document_gains_trailing_newline() {
    assert_eq!(normalize("---\na: 1\n---", &policy()), "---\na: 1\n---\n");
}

#[test]
fn blank_runs_collapse_and_trailing_whitespace_strips() {
    let doc = "First line.  \n\n\n\nSecond line.\t\n\n\n";
    assert_eq!(
        normalize(doc, &StylePolicy::default()),
        "First line.\n\nSecond line.\n"
    );
}

#[test]
fn full_document_is_idempotent() {
    let doc = "\
---
tags: [release-notes]
---
# Release Notes For The API


The new endpoint is exposed by the gateway, and it will obviously simply respond faster than the old endpoint for every request.
Tokens will be rotated automatically.

- Simply run `docflow --will` to check.
> The guide is maintained by the docs team.

```
unchanged   will simply
```
";
    let out = assert_idempotent(doc, &policy());
    assert!(out.contains("The gateway exposes the new endpoint."));
    assert!(out.contains("- run `docflow --will` to check."));
    assert!(out.contains("> The docs team maintains the guide."));
    assert!(out.contains("```\nunchanged   will simply\n```\n"));
    assert!(!out.contains("\n\n\n"));
}

#[test]
fn placeholders_round_trip_many_spans() {
    let text: String = (0..12).map(|i| format!("`c{i}` ")).collect();
    let (locked, spans) = lock_spans(&text);
    assert_eq!(spans.len(), 12);
    assert!(!locked.contains('`'));
    assert_eq!(unlock_spans(&locked, &spans), text);
}

#[test]
fn present_forms_follow_agent_number() {
    assert_eq!(present_form("updated", false), "updates");
    assert_eq!(present_form("updated", true), "update");
    assert_eq!(present_form("copied", false), "copies");
    assert_eq!(present_form("logged", false), "logs");
    assert_eq!(present_form("pushed", false), "pushes");
    assert_eq!(present_form("restored", false), "restores");
    assert_eq!(present_form("reviewed", false), "reviews");
}

#[test]
fn scrubbing_that_exposes_a_passive_still_converges() {
    let policy = StylePolicy {
        active_voice: true,
        forbidden: vec!["simply".to_string()],
        ..StylePolicy::default()
    };
    let out = assert_idempotent("The file is simply created by the admin.\n", &policy);
    assert_eq!(out, "The admin creates the file.\n");
}

#[test]
fn scrubbed_sentence_start_is_recapitalized() {
    let rules = StyleRules::new(&policy());
    assert_eq!(
        scrub_sentences("Simply call it. Obviously it works. it is fine.", &rules.forbidden),
        "Call it. It works. it is fine."
    );
    assert_eq!(normalize("Simply call it.\n", &policy()), "Call it.\n");
}

#[test]
fn manner_phrases_are_not_agents() {
    for text in [
        "Backups are stored by default.",
        "Retries are disabled by design, for now.",
    ] {
        assert_eq!(passive_to_active(text), text);
    }
    assert_idempotent("Backups are stored by default.\n", &policy());
}
