//! End-to-end batch tests over an in-memory store.

use chrono::NaiveTime;
use rekey_core::{
  config::{Profile, ProfileFormat, parse_profiles},
  key,
  store::{DocumentStore, MemoryStore},
};
use rekey_xml::{Element, parse};

use crate::{
  BatchOptions, DocumentOutcome, KeySubstitution, Warning, edit_batch,
  fiscal::{DSIG_NS, NFE_NS, RESOLVER},
  rename_batch,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Sequence 123, issuer 12345678000199.
const SALE_KEY: &str = "35240112345678000199550010000001231000000019";
/// Sequence 124.
const SHIPMENT_KEY: &str = "35240112345678000199550010000001241000000010";
/// Someone else's key that happens to carry sequence 123.
const FOREIGN_KEY: &str = "35240199999999000199550010000001239999999990";
const TRANSPORT_KEY: &str = "35240198765432000199570010000000551000000016";

const NEW_CNPJ: &str = "11222333000181";

fn options() -> BatchOptions {
  BatchOptions {
    dry_run: false,
    time:    NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
  }
}

fn profile(toml_text: &str) -> Profile {
  let mut profiles = parse_profiles(toml_text, ProfileFormat::Toml).unwrap();
  profiles.remove("P").unwrap()
}

const ISSUER_PROFILE: &str = r#"
[P.enabled]
issuer = true

[P.issuer]
CNPJ = "11.222.333/0001-81"
"#;

fn new_key(old: &str) -> String {
  KeySubstitution {
    issuer_id: Some(NEW_CNPJ.into()),
    ..Default::default()
  }
  .derive(&key::AccessKey::parse(old).unwrap())
  .unwrap()
  .to_string()
}

/// An invoice with one line item.
fn invoice(key: &str, seq: &str, cfop: &str, item: &str, totals: &str) -> String {
  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{key}" versao="4.00">
      <ide><cUF>35</cUF><natOp>Venda</natOp><serie>1</serie><nNF>{seq}</nNF>
        <dhEmi>2024-01-10T09:00:00-03:00</dhEmi></ide>
      <emit><CNPJ>12345678000199</CNPJ><xNome>Old Co</xNome>
        <enderEmit><xMun>Sao Paulo</xMun></enderEmit></emit>
      <det nItem="1">
        <prod><cProd>A1</cProd><CFOP>{cfop}</CFOP>{item}</prod>
        <imposto>
          <IPI><cEnq>999</cEnq><IPITrib><CST>50</CST><vBC>100.00</vBC>
            <pIPI>10.0000</pIPI><vIPI>10.00</vIPI></IPITrib></IPI>
        </imposto>
      </det>
      <total><ICMSTot>{totals}</ICMSTot></total>
    </infNFe>
    <Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo/></Signature>
  </NFe>
  <protNFe><infProt><chNFe>{key}</chNFe><dhRecbto>2024-01-10T09:01:00-03:00</dhRecbto></infProt></protNFe>
</nfeProc>"#
  )
}

fn sale() -> String {
  invoice(
    SALE_KEY,
    "123",
    "5102",
    "<vProd>100.00</vProd>",
    "<vProd>100.00</vProd><vIPI>10.00</vIPI><vNF>110.00</vNF>",
  )
}

fn transport(reference: &str) -> String {
  format!(
    r#"<cteProc xmlns="http://www.portalfiscal.inf.br/cte" versao="4.00">
  <CTe><infCte Id="CTe{TRANSPORT_KEY}" versao="4.00">
    <ide><cUF>35</cUF><nCT>55</nCT><dhEmi>2024-01-10T09:00:00-03:00</dhEmi></ide>
    <emit><CNPJ>98765432000199</CNPJ></emit>
    <rem><CNPJ>12345678000199</CNPJ></rem>
    <infCTeNorm><infDoc><infNFe><chave>{reference}</chave></infNFe></infDoc></infCTeNorm>
  </infCte></CTe>
  <protCTe><infProt><chCTe>{TRANSPORT_KEY}</chCTe></infProt></protCTe>
</cteProc>"#
  )
}

fn cancellation(key: &str) -> String {
  format!(
    r#"<procEventoNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.00">
  <evento versao="1.00"><infEvento Id="ID110111{key}01">
    <tpEvento>110111</tpEvento><chNFe>{key}</chNFe>
    <dhEvento>2024-01-11T08:00:00-03:00</dhEvento>
  </infEvento></evento>
  <retEvento versao="1.00"><infEvento><chNFe>{key}</chNFe>
    <dhRegEvento>2024-01-11T08:00:05-03:00</dhRegEvento></infEvento></retEvento>
</procEventoNFe>"#
  )
}

fn stored(store: &MemoryStore, name: &str) -> Element {
  parse(store.get(name).unwrap()).unwrap()
}

fn text<'a>(root: &'a Element, path: &str) -> Option<&'a str> {
  RESOLVER.find_deep(root, path).map(|e| e.text().trim())
}

// ─── Identity and references ─────────────────────────────────────────────────

#[test]
fn issuer_substitution_rekeys_invoice_and_protocol() {
  let mut store = MemoryStore::new().with("a.xml", sale());
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let doc = report.document("a.xml").unwrap();
  assert_eq!(doc.outcome, DocumentOutcome::IdentityChanged);

  let new = new_key(SALE_KEY);
  let root = stored(&store, "a.xml");
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  assert_eq!(inf.attr("Id"), Some(format!("NFe{new}").as_str()));
  assert_eq!(text(&root, "protNFe/infProt/chNFe"), Some(new.as_str()));
  assert_eq!(text(&root, "emit/CNPJ"), Some(NEW_CNPJ));
  assert!(key::AccessKey::parse(&new).unwrap().is_consistent());
}

#[test]
fn transport_reference_follows_sequence_number() {
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("cte.xml", transport(FOREIGN_KEY));
  edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let root = stored(&store, "cte.xml");
  let chave = text(&root, "infDoc/infNFe/chave").unwrap();
  assert_eq!(chave, new_key(SALE_KEY));
  assert_ne!(chave, SALE_KEY);
  // its own key is rekeyed too, and the protocol echo follows
  let new_cte = new_key(TRANSPORT_KEY);
  assert_eq!(text(&root, "protCTe/infProt/chCTe"), Some(new_cte.as_str()));
}

#[test]
fn transport_reference_falls_back_to_sale_key() {
  let unrelated = "35240100000000000000550010000009991000000015";
  let mut store = MemoryStore::new()
    .with("123 - Venda.xml", sale())
    .with("cte.xml", transport(unrelated));
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let root = stored(&store, "cte.xml");
  assert_eq!(
    text(&root, "infDoc/infNFe/chave"),
    Some(new_key(SALE_KEY).as_str())
  );
  assert!(report.warnings.is_empty());
}

#[test]
fn unresolvable_transport_reference_is_warned() {
  let unrelated = "35240100000000000000550010000009991000000015";
  let mut store = MemoryStore::new().with("cte.xml", transport(unrelated));
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  assert!(report.warnings.iter().any(|w| matches!(
    w,
    Warning::UnresolvedReference { reference, .. } if reference == unrelated
  )));
  let root = stored(&store, "cte.xml");
  assert_eq!(text(&root, "infDoc/infNFe/chave"), Some(unrelated));
}

#[test]
fn unresolvable_reference_is_warned_without_key_changes() {
  let unrelated = "35240100000000000000550010000009991000000015";
  let p = profile(
    r#"
[P.enabled]
issuer = true

[P.issuer]
xNome = "New Co"
"#,
  );
  let mut store = MemoryStore::new().with("cte.xml", transport(unrelated));
  let report = edit_batch(&mut store, &p, &options()).unwrap();

  assert!(matches!(
    report.warnings.as_slice(),
    [Warning::UnresolvedReference { document, reference }]
      if document == "cte.xml" && reference == unrelated
  ));
}

#[test]
fn cancellation_and_echo_follow_the_remapped_key() {
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("can.xml", cancellation(SALE_KEY));
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();
  assert_eq!(
    report.document("can.xml").unwrap().outcome,
    DocumentOutcome::IdentityChanged
  );

  let new = new_key(SALE_KEY);
  let root = stored(&store, "can.xml");
  let mut seen = 0;
  root.walk(&mut |el| {
    if el.local() == "chNFe" {
      assert_eq!(el.text(), new);
      seen += 1;
    }
  });
  assert_eq!(seen, 2);
  let event = RESOLVER.find_deep(&root, "evento/infEvento").unwrap();
  assert_eq!(event.attr("Id"), Some(format!("ID110111{new}01").as_str()));
}

#[test]
fn devolution_reference_is_rewritten_when_enabled() {
  let devolution = invoice(
    SHIPMENT_KEY,
    "124",
    "1202",
    "<vProd>100.00</vProd>",
    "<vProd>100.00</vProd><vNF>100.00</vNF>",
  )
  .replace(
    "<nNF>124</nNF>",
    &format!("<nNF>124</nNF><NFref><refNFe>{SALE_KEY}</refNFe></NFref>"),
  );
  let p = profile(
    r#"
[P.enabled]
issuer = true
references = true

[P.issuer]
CNPJ = "11222333000181"
"#,
  );
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("dev.xml", devolution);
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "dev.xml");
  assert_eq!(text(&root, "NFref/refNFe"), Some(new_key(SALE_KEY).as_str()));
}

#[test]
fn oversized_series_keeps_the_original_identifier() {
  let p = profile(
    r#"
[P.enabled]
series = true

[P.identification]
series = "1234"
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", sale());
  let report = edit_batch(&mut store, &p, &options()).unwrap();

  assert!(report.warnings.iter().any(|w| matches!(
    w,
    Warning::KeyLengthMismatch { document, .. } if document == "a.xml"
  )));
  let root = stored(&store, "a.xml");
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  assert_eq!(inf.attr("Id"), Some(format!("NFe{SALE_KEY}").as_str()));
  assert_eq!(text(&root, "protNFe/infProt/chNFe"), Some(SALE_KEY));
}

#[test]
fn short_identifier_is_reported_and_left_alone() {
  let broken = sale().replace(&format!("NFe{SALE_KEY}"), "NFe3524");
  let mut store = MemoryStore::new().with("a.xml", broken.clone());
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  assert!(matches!(
    report.warnings.as_slice(),
    [Warning::MalformedIdentifier { id, .. }] if id == "NFe3524"
  ));
  assert_eq!(report.document("a.xml").unwrap().outcome, DocumentOutcome::Skipped);
  assert_eq!(store.text("a.xml"), Some(broken.as_str()));
}

// ─── Field groups ────────────────────────────────────────────────────────────

#[test]
fn zeroing_ipi_reduces_the_total_by_the_line_amount() {
  let shipment = invoice(
    SHIPMENT_KEY,
    "124",
    "5949",
    "<vProd>100.00</vProd>",
    "<vProd>100.00</vProd><vIPI>10.00</vIPI><vNF>110.00</vNF>",
  );
  let p = profile(
    r#"
[[P.zeroing]]
component = "IPI"
operations = ["shipment"]
"#,
  );
  let mut store = MemoryStore::new().with("r.xml", shipment);
  let report = edit_batch(&mut store, &p, &options()).unwrap();
  assert_eq!(
    report.document("r.xml").unwrap().outcome,
    DocumentOutcome::FieldChanged
  );

  let root = stored(&store, "r.xml");
  assert_eq!(text(&root, "det/imposto/IPI/IPITrib/vIPI"), Some("0.00"));
  assert_eq!(text(&root, "det/imposto/IPI/IPITrib/pIPI"), Some("0.0000"));
  assert_eq!(text(&root, "total/ICMSTot/vIPI"), Some("0.00"));
  assert_eq!(text(&root, "total/ICMSTot/vNF"), Some("100.00"));
}

#[test]
fn zeroing_skips_other_operations() {
  let p = profile(
    r#"
[[P.zeroing]]
component = "IPI"
operations = ["shipment", "return"]
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", sale());
  let report = edit_batch(&mut store, &p, &options()).unwrap();
  assert_eq!(report.document("a.xml").unwrap().outcome, DocumentOutcome::Skipped);
}

#[test]
fn zeroing_leaves_other_total_terms_as_declared() {
  let shipment = invoice(
    SHIPMENT_KEY,
    "124",
    "5949",
    "<vProd>100.00</vProd>",
    "<vProd>100.00</vProd><vICMSDeson>5.00</vICMSDeson><vIPI>10.00</vIPI>\
     <vIPIDevol>3.00</vIPIDevol><vNF>108.00</vNF>",
  );
  let p = profile(
    r#"
[[P.zeroing]]
component = "IPI"
operations = ["shipment"]
"#,
  );
  let mut store = MemoryStore::new().with("r.xml", shipment);
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "r.xml");
  assert_eq!(text(&root, "total/ICMSTot/vICMSDeson"), Some("5.00"));
  assert_eq!(text(&root, "total/ICMSTot/vIPIDevol"), Some("3.00"));
  assert_eq!(text(&root, "total/ICMSTot/vIPI"), Some("0.00"));
  assert_eq!(text(&root, "total/ICMSTot/vNF"), Some("98.00"));
}

#[test]
fn failed_mutation_leaves_the_document_untouched() {
  let broken = invoice(
    SHIPMENT_KEY,
    "124",
    "5949",
    "<vProd>cem reais</vProd>",
    "<vProd>100.00</vProd><vNF>110.00</vNF>",
  );
  let p = profile(
    r#"
[P.enabled]
tax_reform = true

[P.tax_reform]
state_rate = "1.50"
"#,
  );
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("bad.xml", broken.clone());
  let report = edit_batch(&mut store, &p, &options()).unwrap();

  let bad = report.document("bad.xml").unwrap();
  assert!(matches!(&bad.outcome, DocumentOutcome::Failed(reason) if reason.contains("vProd")));
  assert_eq!(store.get("bad.xml"), Some(broken.as_bytes()));

  assert_eq!(
    report.document("a.xml").unwrap().outcome,
    DocumentOutcome::FieldChanged
  );
  assert_eq!(report.counts().failed, 1);
}

#[test]
fn reform_blocks_sum_exact_line_amounts() {
  let two_items = invoice(
    SALE_KEY,
    "123",
    "5102",
    "<vProd>200.00</vProd>",
    "<vProd>300.00</vProd><vNF>300.00</vNF>",
  )
  .replace(
    "</det>",
    r#"</det><det nItem="2"><prod><CFOP>5102</CFOP><vProd>100.00</vProd></prod><imposto/></det>"#,
  );
  let p = profile(
    r#"
[P.enabled]
tax_reform = true

[P.tax_reform]
state_rate = "1.50"
federal_rate = "0.90"
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", two_items);
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "a.xml");
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  let dets = RESOLVER.find_all(inf, "det");
  assert_eq!(dets.len(), 2);
  assert_eq!(
    RESOLVER.text(dets[0], "imposto/IBSCBS/gIBSCBS/gIBSUF/vIBSUF"),
    Some("3.00")
  );
  assert_eq!(
    RESOLVER.text(dets[1], "imposto/IBSCBS/gIBSCBS/gIBSUF/vIBSUF"),
    Some("1.50")
  );
  assert_eq!(
    RESOLVER.text(dets[0], "imposto/IBSCBS/gIBSCBS/gCBS/vCBS"),
    Some("1.80")
  );

  let tot = RESOLVER.find(inf, "total/IBSCBSTot").unwrap();
  assert_eq!(RESOLVER.text(tot, "vBCIBSCBS"), Some("300.00"));
  assert_eq!(RESOLVER.text(tot, "gIBS/gIBSUF/vIBSUF"), Some("4.50"));
  assert_eq!(RESOLVER.text(tot, "gIBS/vIBS"), Some("4.50"));
  assert_eq!(RESOLVER.text(tot, "gCBS/vCBS"), Some("2.70"));
}

#[test]
fn reform_rerun_replaces_instead_of_merging() {
  let p = profile(
    r#"
[P.enabled]
tax_reform = true

[P.tax_reform]
state_rate = "1.50"
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", sale());
  edit_batch(&mut store, &p, &options()).unwrap();
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "a.xml");
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  assert_eq!(RESOLVER.find_all(inf, "det/imposto/IBSCBS").len(), 1);
  assert_eq!(RESOLVER.find_all(inf, "total/IBSCBSTot").len(), 1);
}

#[test]
fn date_substitution_rewrites_timestamps_and_key() {
  let p = profile(
    r#"
[P]
date = "05/07/2025"

[P.enabled]
date = true
"#,
  );
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("can.xml", cancellation(SALE_KEY));
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "a.xml");
  assert_eq!(text(&root, "ide/dhEmi"), Some("2025-07-05T10:30:00-03:00"));
  assert_eq!(
    text(&root, "protNFe/infProt/dhRecbto"),
    Some("2025-07-05T10:30:00-03:00")
  );
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  assert!(inf.attr("Id").unwrap().starts_with("NFe352507"));

  let can = stored(&store, "can.xml");
  assert_eq!(
    text(&can, "retEvento/infEvento/dhRegEvento"),
    Some("2025-07-05T10:30:00-03:00")
  );
}

#[test]
fn addressee_goes_to_pickup_block_on_sales() {
  let p = profile(
    r#"
[P.enabled]
addressee = true

[P.addressee]
CNPJ = "11222333000181"
xLgr = "Rua 1"
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", sale());
  edit_batch(&mut store, &p, &options()).unwrap();

  let root = stored(&store, "a.xml");
  let inf = RESOLVER.find_deep(&root, "NFe/infNFe").unwrap();
  assert_eq!(RESOLVER.text(inf, "retirada/CNPJ"), Some(NEW_CNPJ));
  assert_eq!(RESOLVER.text(inf, "retirada/xLgr"), Some("Rua 1"));
  assert!(RESOLVER.find(inf, "dest").is_none());
}

#[test]
fn void_range_registration_is_rebuilt() {
  let inut = r#"<procInutNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <inutNFe versao="4.00"><infInut Id="ID35241234567800019955001000000010000000015">
    <cUF>35</cUF><ano>24</ano><CNPJ>12345678000199</CNPJ><mod>55</mod><serie>1</serie>
  </infInut></inutNFe>
  <retInutNFe versao="4.00"><infInut Id="ID135240000001">
    <CNPJ>12345678000199</CNPJ><dhRecbto>2024-01-10T09:00:00-03:00</dhRecbto>
  </infInut></retInutNFe>
</procInutNFe>"#;
  let mut store = MemoryStore::new().with("inut.xml", inut);
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();
  assert!(report.warnings.is_empty());

  let root = stored(&store, "inut.xml");
  let req = RESOLVER.find_deep(&root, "inutNFe/infInut").unwrap();
  assert_eq!(
    req.attr("Id"),
    Some("ID35241122233300018155001000000010000000015")
  );
  assert_eq!(RESOLVER.text(req, "CNPJ"), Some(NEW_CNPJ));
  let echo = RESOLVER.find_deep(&root, "retInutNFe/infInut").unwrap();
  assert_eq!(echo.attr("Id"), Some("ID135240000001"));
  assert_eq!(RESOLVER.text(echo, "CNPJ"), Some(NEW_CNPJ));
}

#[test]
fn void_range_that_cannot_be_rebuilt_keeps_its_fields() {
  let inut = r#"<procInutNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <inutNFe versao="4.00"><infInut Id="ID35241234567800019955001000000010000000015">
    <cUF>35</cUF><ano>24</ano><CNPJ>12345678000199</CNPJ><mod>55</mod><serie>1</serie>
  </infInut></inutNFe>
</procInutNFe>"#;
  let p = profile(
    r#"
[P.enabled]
issuer = true
series = true

[P.issuer]
CNPJ = "11.222.333/0001-81"

[P.identification]
series = "1234"
"#,
  );
  let mut store = MemoryStore::new().with("inut.xml", inut);
  let report = edit_batch(&mut store, &p, &options()).unwrap();

  assert!(matches!(
    report.warnings.as_slice(),
    [Warning::KeyLengthMismatch { document, .. }] if document == "inut.xml"
  ));
  assert_eq!(report.document("inut.xml").unwrap().outcome, DocumentOutcome::Skipped);
  assert_eq!(store.text("inut.xml"), Some(inut));
}

// ─── Batch behaviour ─────────────────────────────────────────────────────────

#[test]
fn dry_run_writes_nothing() {
  let original = sale();
  let mut store = MemoryStore::new().with("a.xml", original.clone());
  let opts = BatchOptions {
    dry_run: true,
    ..options()
  };
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &opts).unwrap();

  assert!(report.dry_run);
  assert_eq!(report.counts().identity_changed, 1);
  assert!(!report.document("a.xml").unwrap().changes.is_empty());
  assert_eq!(store.text("a.xml"), Some(original.as_str()));
}

#[test]
fn unreadable_document_fails_alone() {
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("broken.xml", "<nfeProc><NFe></nfeProc>");
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let counts = report.counts();
  assert_eq!(counts.failed, 1);
  assert_eq!(counts.identity_changed, 1);
  assert!(matches!(
    report.document("broken.xml").unwrap().outcome,
    DocumentOutcome::Failed(_)
  ));
  assert_eq!(store.text("broken.xml"), Some("<nfeProc><NFe></nfeProc>"));
}

#[test]
fn leading_garbage_is_tolerated() {
  let mut store = MemoryStore::new().with("a.xml", format!("\u{feff}junk{}", sale()));
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();
  assert_eq!(report.counts().identity_changed, 1);
}

#[test]
fn unchanged_documents_are_skipped_and_not_written() {
  let original = sale();
  let mut store = MemoryStore::new()
    .with("a.xml", original.clone())
    .with("notes.xml", "<resumo><x/></resumo>");
  let report = edit_batch(&mut store, &Profile::default(), &options()).unwrap();

  assert_eq!(report.counts().skipped, 2);
  assert_eq!(store.text("a.xml"), Some(original.as_str()));
}

#[test]
fn rerun_with_same_profile_is_skipped() {
  let p = profile(
    r#"
[P.enabled]
issuer = true

[P.issuer]
xNome = "New Co"
"#,
  );
  let mut store = MemoryStore::new().with("a.xml", sale());
  let first = edit_batch(&mut store, &p, &options()).unwrap();
  assert_eq!(first.counts().field_changed, 1);
  let second = edit_batch(&mut store, &p, &options()).unwrap();
  assert_eq!(second.counts().skipped, 1);
}

#[test]
fn output_declares_one_default_namespace_per_subtree() {
  let mut store = MemoryStore::new().with("a.xml", sale());
  edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let out = store.text("a.xml").unwrap();
  assert!(out.starts_with("<?xml"));
  assert_eq!(out.matches(&format!("xmlns=\"{NFE_NS}\"")).count(), 1);
  assert!(out.contains(&format!("<Signature xmlns=\"{DSIG_NS}\">")));
  assert!(!out.contains("ns0:"));
}

// ─── Renaming ────────────────────────────────────────────────────────────────

#[test]
fn rename_then_edit_uses_the_sale_convention() {
  let unrelated = "35240100000000000000550010000009991000000015";
  let mut store = MemoryStore::new()
    .with("download-1.xml", sale())
    .with("download-2.xml", cancellation(SALE_KEY))
    .with("cte.xml", transport(unrelated));

  let renamed = rename_batch(&mut store, false).unwrap();
  assert_eq!(renamed.renamed.len(), 2);
  let names: Vec<&str> = store.names().collect();
  assert_eq!(names, vec!["123 - Venda.xml", "CAN-123.xml", "cte.xml"]);

  edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();
  let root = stored(&store, "cte.xml");
  assert_eq!(
    text(&root, "infDoc/infNFe/chave"),
    Some(new_key(SALE_KEY).as_str())
  );
}

#[test]
fn rename_never_overwrites() {
  let mut store = MemoryStore::new()
    .with("123 - Venda.xml", "<other/>")
    .with("a.xml", sale());
  let report = rename_batch(&mut store, false).unwrap();
  assert!(report.renamed.is_empty());
  assert_eq!(report.skipped.len(), 1);
  assert!(store.exists("a.xml").unwrap());
  assert_eq!(store.text("123 - Venda.xml"), Some("<other/>"));
}

#[test]
fn rename_dry_run_only_plans() {
  let mut store = MemoryStore::new().with("a.xml", sale());
  let report = rename_batch(&mut store, true).unwrap();
  assert_eq!(report.renamed.len(), 1);
  assert!(store.exists("a.xml").unwrap());
  assert!(!store.exists("123 - Venda.xml").unwrap());
}

#[test]
fn report_serializes_with_tagged_outcomes() {
  let mut store = MemoryStore::new()
    .with("a.xml", sale())
    .with("broken.xml", "<a><b></a>");
  let report = edit_batch(&mut store, &profile(ISSUER_PROFILE), &options()).unwrap();

  let json = serde_json::to_value(&report).unwrap();
  let docs = json["documents"].as_array().unwrap();
  assert_eq!(docs[0]["name"], "a.xml");
  assert_eq!(docs[0]["kind"], "primary_invoice");
  assert_eq!(docs[0]["outcome"]["status"], "identity_changed");
  assert_eq!(docs[1]["outcome"]["status"], "failed");
  assert!(docs[1]["outcome"]["reason"].is_string());
}
