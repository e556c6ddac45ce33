//! Shared fixtures for integration tests

#![allow(dead_code)]

use eicr_refiner::adapters::terminology::{GrouperRecord, InMemoryTerminology};
use eicr_refiner::config::SectionCatalog;
use eicr_refiner::core::refine::Refiner;
use eicr_refiner::domain::CodeSystem;
use serde_json::json;
use std::sync::Arc;

pub const COVID: &str = "840539006";
pub const PERTUSSIS: &str = "27836007";

pub const EICR_V1_1: &str = "2016-12-01";
pub const EICR_V3_1_1: &str = "2022-05-01";

pub const RESULTS: &str = "30954-2";
pub const PROBLEMS: &str = "11450-4";
pub const SOCIAL_HISTORY: &str = "29762-2";

/// eICR wrapping the given `<component><section>` fragments
pub fn eicr(extension: &str, sections: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinicalDocument xmlns="urn:hl7-org:v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <templateId root="2.16.840.1.113883.10.20.22.1.1" extension="2015-08-01"/>
  <templateId root="2.16.840.1.113883.10.20.15.2" extension="{extension}"/>
  <id root="db734647-fc99-424c-a864-7e3cda82e703"/>
  <code code="55751-2" codeSystem="2.16.840.1.113883.6.1" displayName="Public Health Case Report"/>
  <title>Initial Public Health Case Report</title>
  <component>
    <structuredBody>
{}
    </structuredBody>
  </component>
</ClinicalDocument>
"#,
        sections.concat()
    )
}

/// A section component with code, title, narrative and the given entries
pub fn section(code: &str, title: &str, entries: &[String]) -> String {
    format!(
        r#"      <component>
        <section>
          <code code="{code}" codeSystem="2.16.840.1.113883.6.1"/>
          <title>{title}</title>
          <text><paragraph>Original narrative for {title}</paragraph></text>
{}
        </section>
      </component>
"#,
        entries.concat()
    )
}

/// Entry holding an observation whose own code is `code`
pub fn observation_entry(code: &str, display: &str) -> String {
    format!(
        r#"          <entry>
            <observation classCode="OBS" moodCode="EVN">
              <code code="{code}" codeSystem="2.16.840.1.113883.6.1" displayName="{display}"/>
              <statusCode code="completed"/>
            </observation>
          </entry>
"#
    )
}

/// Entry holding a problem observation whose coded value is `code`
pub fn problem_entry(code: &str, display: &str) -> String {
    format!(
        r#"          <entry>
            <act classCode="ACT" moodCode="EVN">
              <entryRelationship typeCode="SUBJ">
                <observation classCode="OBS" moodCode="EVN">
                  <code code="55607006" codeSystem="2.16.840.1.113883.6.96" displayName="Problem"/>
                  <value xsi:type="CD" code="{code}" codeSystem="2.16.840.1.113883.6.96" displayName="{display}"/>
                </observation>
              </entryRelationship>
            </act>
          </entry>
"#
    )
}

/// Entry whose code only appears as a translation
pub fn translation_entry(code: &str, translation: &str) -> String {
    format!(
        r#"          <entry>
            <observation classCode="OBS" moodCode="EVN">
              <code code="{code}" codeSystem="2.16.840.1.113883.6.1">
                <translation code="{translation}" codeSystem="2.16.840.1.113883.6.12"/>
              </code>
            </observation>
          </entry>
"#
    )
}

/// RR with a single coded information organizer holding `observations`
pub fn rr(observations: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinicalDocument xmlns="urn:hl7-org:v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <templateId root="2.16.840.1.113883.10.20.15.2.1.2" extension="2017-04-01"/>
  <code code="88085-6" codeSystem="2.16.840.1.113883.6.1"/>
  <component>
    <structuredBody>
      <component>
        <section>
          <templateId root="2.16.840.1.113883.10.20.15.2.2.2" extension="2017-04-01"/>
          <code code="55112-7" codeSystem="2.16.840.1.113883.6.1"/>
          <entry>
            <organizer classCode="CLUSTER" moodCode="EVN">
              <templateId root="2.16.840.1.113883.10.20.15.2.3.34" extension="2017-04-01"/>
              <code code="RR11" codeSystem="2.16.840.1.114222.4.5.232"/>
{}
            </organizer>
          </entry>
        </section>
      </component>
    </structuredBody>
  </component>
</ClinicalDocument>
"#,
        observations.concat()
    )
}

/// Relevant reportable condition observation with one information organizer
pub fn rr_condition(code: &str, display: &str, jurisdiction: &str, determination: &str) -> String {
    rr_condition_with(code, display, jurisdiction, Some(determination))
}

/// Relevant reportable condition observation; `None` omits the RR1 determination
pub fn rr_condition_with(
    code: &str,
    display: &str,
    jurisdiction: &str,
    determination: Option<&str>,
) -> String {
    let determination = determination
        .map(|value| {
            format!(
                r#"                      <component>
                        <observation classCode="OBS" moodCode="EVN">
                          <templateId root="2.16.840.1.113883.10.20.15.2.3.19" extension="2017-04-01"/>
                          <code code="RR1" codeSystem="2.16.840.1.114222.4.5.232"/>
                          <value xsi:type="CD" code="{value}" codeSystem="2.16.840.1.114222.4.5.274"/>
                        </observation>
                      </component>
"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"              <component>
                <observation classCode="OBS" moodCode="EVN">
                  <templateId root="2.16.840.1.113883.10.20.15.2.3.12" extension="2017-04-01"/>
                  <code code="64572001" codeSystem="2.16.840.1.113883.6.96" displayName="Condition"/>
                  <value xsi:type="CD" code="{code}" codeSystem="2.16.840.1.113883.6.96" displayName="{display}"/>
                  <entryRelationship typeCode="COMP">
                    <organizer classCode="CLUSTER" moodCode="EVN">
                      <templateId root="2.16.840.1.113883.10.20.15.2.3.13" extension="2017-04-01"/>
                      <participant typeCode="LOC">
                        <participantRole>
                          <id root="2.16.840.1.113883.4.6" extension="{jurisdiction}"/>
                          <code code="RR7" codeSystem="2.16.840.1.114222.4.5.232"/>
                        </participantRole>
                      </participant>
{determination}                    </organizer>
                  </entryRelationship>
                </observation>
              </component>
"#
    )
}

/// Terminology with COVID-19 and pertussis groupers sharing one LOINC code
pub fn terminology() -> InMemoryTerminology {
    InMemoryTerminology::new()
        .with_grouper(
            GrouperRecord::new(COVID)
                .with_display_name("COVID-19")
                .with_codes(
                    CodeSystem::Loinc,
                    json!([
                        {"code": "94500-6", "display": "SARS-CoV-2 RNA"},
                        {"code": "94309-2", "display": "SARS-CoV-2 RNA NAA"},
                        {"code": "68991-9", "display": "Epidemiologically important information"}
                    ]),
                )
                .with_codes(CodeSystem::Snomed, json!([{"code": COVID, "display": "COVID-19"}])),
        )
        .with_grouper(
            GrouperRecord::new(PERTUSSIS)
                .with_display_name("Pertussis")
                .with_codes(
                    CodeSystem::Loinc,
                    json!([
                        {"code": "548-8", "display": "Bordetella pertussis culture"},
                        {"code": "68991-9", "display": "Epidemiologically important information"}
                    ]),
                )
                .with_codes(
                    CodeSystem::Snomed,
                    json!([{"code": PERTUSSIS, "display": "Pertussis"}]),
                ),
        )
}

pub fn refiner() -> Refiner {
    Refiner::new(Arc::new(SectionCatalog::builtin()), Arc::new(terminology()))
}

/// Counts `<entry` start tags in serialized XML
pub fn entry_count(xml: &str) -> usize {
    xml.matches("<entry>").count() + xml.matches("<entry ").count()
}
