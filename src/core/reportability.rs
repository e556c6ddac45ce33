//! Reportability extraction
//!
//! Reads an RR and reports, per jurisdiction, the conditions determined
//! reportable. The walk is:
//!
//! 1. the Reportability Response Summary Section (`55112-7`)
//! 2. its single coded information organizer (`RR11`)
//! 3. each relevant reportable condition observation inside it
//! 4. per reportability information organizer (or the observation itself
//!    when there is none): the determination (`RR1`) and the responsible
//!    jurisdiction (`RR7` routing entity, else `RR8` responsible agency)
//!
//! Observations whose determination is anything other than `RRVS1`, or
//! whose value is not SNOMED coded, are skipped silently.

use crate::document::cda::{child_code, has_template, is_hl7, HL7_NS};
use crate::document::{Element, XmlTree};
use crate::domain::{
    ConditionId, JurisdictionId, JurisdictionReportableConditions, RefinerError,
    ReportableCondition, Result,
};

/// LOINC code of the Reportability Response Summary Section
pub const RR_SUMMARY_SECTION: &str = "55112-7";

/// Display name used when the RR gives none
pub const UNKNOWN_CONDITION: &str = "Unknown condition";

const CODED_INFORMATION_ORGANIZER: &str = "2.16.840.1.113883.10.20.15.2.3.34";
const CODED_INFORMATION_ORGANIZER_CODE: &str = "RR11";
const RELEVANT_REPORTABLE_CONDITION: &str = "2.16.840.1.113883.10.20.15.2.3.12";
const REPORTABILITY_INFORMATION_ORGANIZER: &str = "2.16.840.1.113883.10.20.15.2.3.13";
const DETERMINATION_OBSERVATION: &str = "2.16.840.1.113883.10.20.15.2.3.19";
const DETERMINATION_CODE: &str = "RR1";
const REPORTABLE: &str = "RRVS1";
const ROUTING_ENTITY: &str = "RR7";
const RESPONSIBLE_AGENCY: &str = "RR8";
const SNOMED_OID: &str = "2.16.840.1.113883.6.96";

/// Extracts reportable conditions grouped by jurisdiction
///
/// # Errors
///
/// [`RefinerError::Structure`] when the summary section is missing or does
/// not hold exactly one coded information organizer. Zero reportable
/// conditions is an empty list, not an error.
pub fn extract(rr: &XmlTree) -> Result<Vec<JurisdictionReportableConditions>> {
    let summary = rr
        .root()
        .descendants_and_self()
        .find(|e| is_hl7(e, "section") && child_code(e) == Some(RR_SUMMARY_SECTION))
        .ok_or_else(|| {
            RefinerError::Structure(format!(
                "RR has no Reportability Response Summary Section ({RR_SUMMARY_SECTION})"
            ))
        })?;

    let organizers: Vec<&Element> = summary
        .descendants()
        .filter(|e| is_hl7(e, "organizer"))
        .filter(|e| {
            has_template(e, CODED_INFORMATION_ORGANIZER)
                || child_code(e) == Some(CODED_INFORMATION_ORGANIZER_CODE)
        })
        .collect();

    let organizer = match organizers.as_slice() {
        [organizer] => *organizer,
        [] => {
            return Err(RefinerError::Structure(
                "RR summary section has no coded information organizer".to_string(),
            ))
        }
        many => {
            return Err(RefinerError::Structure(format!(
                "RR summary section has {} coded information organizers, expected exactly one",
                many.len()
            )))
        }
    };

    let mut results: Vec<JurisdictionReportableConditions> = Vec::new();
    for observation in organizer
        .descendants()
        .filter(|e| is_hl7(e, "observation") && has_template(e, RELEVANT_REPORTABLE_CONDITION))
    {
        let Some(condition) = reportable_condition(observation) else {
            continue;
        };

        for scope in reportability_scopes(observation) {
            if !is_reportable(scope) {
                tracing::debug!(code = %condition.code, "Condition not determined reportable");
                continue;
            }

            let Some(jurisdiction) = jurisdiction(scope) else {
                tracing::warn!(
                    code = %condition.code,
                    "Reportable condition has no responsible jurisdiction, skipping"
                );
                continue;
            };

            let index = match results.iter().position(|r| r.jurisdiction == jurisdiction) {
                Some(index) => index,
                None => {
                    results.push(JurisdictionReportableConditions::new(jurisdiction));
                    results.len() - 1
                }
            };
            results[index].push_unique(condition.clone());
        }
    }

    tracing::debug!(
        jurisdictions = results.len(),
        conditions = results.iter().map(|r| r.conditions.len()).sum::<usize>(),
        "Extracted reportability"
    );
    Ok(results)
}

/// Distinct reportable condition codes across all jurisdictions, in order of first appearance
pub fn reportable_condition_ids(
    results: &[JurisdictionReportableConditions],
) -> Vec<ConditionId> {
    let mut ids: Vec<ConditionId> = Vec::new();
    for condition in results.iter().flat_map(|r| &r.conditions) {
        match ConditionId::new(condition.code.as_str()) {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(e) => tracing::warn!(code = %condition.code, error = %e, "Skipping condition code"),
        }
    }
    ids
}

fn reportable_condition(observation: &Element) -> Option<ReportableCondition> {
    let value = observation
        .child_elements()
        .filter(|e| is_hl7(e, "value"))
        .find(|v| v.attr("codeSystem") == Some(SNOMED_OID))?;

    let code = value.attr("code").map(str::trim).filter(|c| !c.is_empty())?;
    let display = value
        .attr("displayName")
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(UNKNOWN_CONDITION);

    Some(ReportableCondition::new(code, display))
}

fn reportability_scopes(observation: &Element) -> Vec<&Element> {
    let organizers: Vec<&Element> = observation
        .descendants()
        .filter(|e| is_hl7(e, "organizer") && has_template(e, REPORTABILITY_INFORMATION_ORGANIZER))
        .collect();
    if organizers.is_empty() {
        vec![observation]
    } else {
        organizers
    }
}

fn is_reportable(scope: &Element) -> bool {
    scope
        .descendants()
        .filter(|e| is_hl7(e, "observation"))
        .find(|e| {
            has_template(e, DETERMINATION_OBSERVATION) || child_code(e) == Some(DETERMINATION_CODE)
        })
        .and_then(|determination| determination.find_child(HL7_NS, "value"))
        .and_then(|value| value.attr("code"))
        .is_some_and(|code| code.trim() == REPORTABLE)
}

fn jurisdiction(scope: &Element) -> Option<JurisdictionId> {
    let roles: Vec<(&str, &Element)> = scope
        .descendants()
        .filter(|e| is_hl7(e, "participantRole"))
        .filter_map(|role| child_code(role).map(|code| (code, role)))
        .collect();

    [ROUTING_ENTITY, RESPONSIBLE_AGENCY]
        .into_iter()
        .flat_map(|wanted| roles.iter().filter(move |(code, _)| *code == wanted))
        .find_map(|(_, role)| {
            role.child_elements()
                .filter(|e| is_hl7(e, "id"))
                .find_map(|id| id.attr("extension"))
                .and_then(|ext| JurisdictionId::new(ext).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rr(observations: &str) -> XmlTree {
        let xml = format!(
            r#"<ClinicalDocument xmlns="urn:hl7-org:v3"><component><structuredBody><component>
<section>
  <code code="55112-7" codeSystem="2.16.840.1.113883.6.1"/>
  <entry>
    <organizer classCode="CLUSTER" moodCode="EVN">
      <templateId root="2.16.840.1.113883.10.20.15.2.3.34"/>
      <code code="RR11" codeSystem="2.16.840.1.114222.4.5.232"/>
      {observations}
    </organizer>
  </entry>
</section>
</component></structuredBody></component></ClinicalDocument>"#
        );
        XmlTree::parse(&xml).unwrap()
    }

    fn observation(code: &str, display: Option<&str>, organizers: &str) -> String {
        let display = display
            .map(|d| format!(r#" displayName="{d}""#))
            .unwrap_or_default();
        format!(
            r#"<component><observation classCode="OBS" moodCode="EVN">
  <templateId root="2.16.840.1.113883.10.20.15.2.3.12"/>
  <value xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="CD" code="{code}" codeSystem="2.16.840.1.113883.6.96"{display}/>
  {organizers}
</observation></component>"#
        )
    }

    fn info_organizer(role: &str, jurisdiction: &str, determination: &str) -> String {
        format!(
            r#"<entryRelationship typeCode="COMP"><organizer classCode="CLUSTER" moodCode="EVN">
  <templateId root="2.16.840.1.113883.10.20.15.2.3.13"/>
  <participant typeCode="LOC"><participantRole>
    <id extension="{jurisdiction}"/>
    <code code="{role}"/>
  </participantRole></participant>
  <component><observation>
    <templateId root="2.16.840.1.113883.10.20.15.2.3.19"/>
    <code code="RR1"/>
    <value code="{determination}"/>
  </observation></component>
</organizer></entryRelationship>"#
        )
    }

    #[test]
    fn test_jurisdictions_ordered_and_deduplicated() {
        let tree = rr(&[
            observation("840539006", Some("COVID-19"), &info_organizer("RR7", "sddh", "RRVS1")),
            observation(
                "27836007",
                None,
                &format!(
                    "{}{}",
                    info_organizer("RR8", "CDPH", "RRVS1"),
                    info_organizer("RR7", "SDDH", "RRVS1")
                ),
            ),
            observation("840539006", Some("Duplicate"), &info_organizer("RR7", "SDDH", "RRVS1")),
        ]
        .concat());

        let results = extract(&tree).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].jurisdiction.as_str(), "SDDH");
        assert_eq!(
            results[0].conditions,
            vec![
                ReportableCondition::new("840539006", "COVID-19"),
                ReportableCondition::new("27836007", UNKNOWN_CONDITION),
            ]
        );
        assert_eq!(results[1].jurisdiction.as_str(), "CDPH");
    }

    #[test]
    fn test_routing_entity_preferred() {
        let role_pair = r#"<entryRelationship><organizer>
  <templateId root="2.16.840.1.113883.10.20.15.2.3.13"/>
  <participant><participantRole><id extension="AGENCY"/><code code="RR8"/></participantRole></participant>
  <participant><participantRole><id extension="ROUTE"/><code code="RR7"/></participantRole></participant>
  <component><observation><code code="RR1"/><value code="RRVS1"/></observation></component>
</organizer></entryRelationship>"#;
        let tree = rr(&observation("840539006", Some("COVID-19"), role_pair));
        let results = extract(&tree).unwrap();
        assert_eq!(results[0].jurisdiction.as_str(), "ROUTE");
    }

    #[test]
    fn test_non_snomed_value_skipped() {
        let organizer = info_organizer("RR7", "SDDH", "RRVS1");
        let obs = observation("840539006", Some("COVID-19"), &organizer)
            .replace("2.16.840.1.113883.6.96", "2.16.840.1.113883.6.90");
        assert!(extract(&rr(&obs)).unwrap().is_empty());
    }

    #[test]
    fn test_missing_organizer_is_structure_error() {
        let xml = r#"<ClinicalDocument xmlns="urn:hl7-org:v3"><section><code code="55112-7"/></section></ClinicalDocument>"#;
        let err = extract(&XmlTree::parse(xml).unwrap()).unwrap_err();
        assert!(matches!(err, RefinerError::Structure(_)));
    }

    #[test]
    fn test_two_organizers_is_structure_error() {
        let xml = r#"<ClinicalDocument xmlns="urn:hl7-org:v3"><section><code code="55112-7"/>
            <entry><organizer><code code="RR11"/></organizer></entry>
            <entry><organizer><code code="RR11"/></organizer></entry>
        </section></ClinicalDocument>"#;
        assert!(matches!(
            extract(&XmlTree::parse(xml).unwrap()),
            Err(RefinerError::Structure(_))
        ));
    }

    #[test]
    fn test_missing_summary_section_is_structure_error() {
        let xml = r#"<ClinicalDocument xmlns="urn:hl7-org:v3"/>"#;
        assert!(matches!(
            extract(&XmlTree::parse(xml).unwrap()),
            Err(RefinerError::Structure(_))
        ));
    }

    #[test]
    fn test_condition_ids_across_jurisdictions() {
        let mut a = JurisdictionReportableConditions::new(JurisdictionId::new("A").unwrap());
        a.push_unique(ReportableCondition::new("1", "one"));
        a.push_unique(ReportableCondition::new("2", "two"));
        let mut b = JurisdictionReportableConditions::new(JurisdictionId::new("B").unwrap());
        b.push_unique(ReportableCondition::new("2", "two"));
        b.push_unique(ReportableCondition::new("3", "three"));

        let ids: Vec<String> = reportable_condition_ids(&[a, b])
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
