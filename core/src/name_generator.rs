//! Deterministic names for sales reps and prospect companies.
//!
//! Same RNG stream in, same names out. No external fake-data source.

use crate::model::Industry;
use crate::rng::StageRng;

pub struct NameGenerator;

impl NameGenerator {
    /// "First Last" for a sales rep.
    pub fn person_name(rng: &mut StageRng) -> String {
        let first = pick(rng, FIRST_NAMES);
        let last = pick(rng, LAST_NAMES);
        format!("{first} {last}")
    }

    /// A plausible B2B company name, flavoured by the lead's industry.
    pub fn company_name(rng: &mut StageRng, industry: Industry) -> String {
        let stem = if rng.chance(0.6) {
            pick(rng, COMPANY_STEMS)
        } else {
            pick(rng, LAST_NAMES)
        };
        let noun = pick(rng, industry_nouns(industry));
        let suffix = pick(rng, LEGAL_SUFFIXES);
        if suffix.is_empty() {
            format!("{stem} {noun}")
        } else {
            format!("{stem} {noun} {suffix}")
        }
    }
}

fn pick(rng: &mut StageRng, items: &'static [&'static str]) -> &'static str {
    rng.choose(items).copied().unwrap_or("Acme")
}

fn industry_nouns(industry: Industry) -> &'static [&'static str] {
    match industry {
        Industry::Technology => &["Software", "Labs", "Cloud", "Data", "Systems", "Networks"],
        Industry::FinancialServices => &["Capital", "Financial", "Lending", "Wealth", "Payments"],
        Industry::Healthcare => &["Health", "Medical", "Clinics", "Care", "Diagnostics"],
        Industry::Retail => &["Outfitters", "Goods", "Market", "Supply", "Stores"],
        Industry::Manufacturing => &["Industries", "Fabrication", "Components", "Works", "Machining"],
        Industry::ProfessionalServices => &["Advisory", "Consulting", "Partners", "Legal", "Staffing"],
        Industry::Other => &["Group", "Holdings", "Ventures", "Collective", "Company"],
    }
}

const FIRST_NAMES: &[&str] = &[
    "Avery", "Blake", "Camila", "Dana", "Elliot", "Farah", "Gideon", "Hana", "Isaac", "Jonah",
    "Keira", "Leon", "Maya", "Nikhil", "Omar", "Priya", "Quinn", "Rosa", "Sven", "Tara",
    "Umar", "Vera", "Wes", "Ximena", "Yusuf", "Zoe", "Aiden", "Bianca", "Caleb", "Delia",
    "Emeka", "Fiona", "Grant", "Hector", "Ingrid", "Jasmine", "Kofi", "Lena", "Marco", "Nora",
];

const LAST_NAMES: &[&str] = &[
    "Abbott", "Bauer", "Castillo", "Dalton", "Eriksen", "Fischer", "Gupta", "Holloway",
    "Ibarra", "Jensen", "Kowalski", "Lindqvist", "Mbeki", "Novak", "Okafor", "Park",
    "Quintero", "Rasmussen", "Sato", "Thornton", "Underwood", "Vance", "Whitaker", "Yamada",
    "Zhou", "Archer", "Brennan", "Chandra", "Delgado", "Ferreira",
];

const COMPANY_STEMS: &[&str] = &[
    "Northwind", "Bluecrest", "Ironleaf", "Brightpath", "Summit", "Harborview", "Keystone",
    "Silverline", "Redwood", "Clearwater", "Granite", "Lakeshore", "Everpeak", "Pinecone",
    "Tidewater", "Copperfield", "Skyward", "Foxglove", "Meridian", "Oakridge",
];

const LEGAL_SUFFIXES: &[&str] = &["Inc", "LLC", "Corp", "Ltd", "Co", ""];
