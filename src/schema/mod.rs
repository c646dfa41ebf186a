#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Choice(&'static [&'static str]),
    Date,
    Flag,
    Rows(&'static [&'static str]),
    Derived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    Plain,
    StudentRef,
    Author,
    EventDate,
    DerivedGrade,
    DerivedSection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    MinLen(usize),
    Matches(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub role: FieldRole,
    pub rules: &'static [Rule],
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdfStrategy {
    ServerRendered,
    ClientComposed,
}

#[derive(Clone, Copy, Debug)]
pub struct EndpointSet {
    pub collection: &'static str,
    pub pdf: Option<&'static str>,
}

impl EndpointSet {
    pub fn item(&self, id: &str) -> String {
        format!("{}/{}", self.collection, id)
    }

    pub fn pdf_for(&self, id: &str) -> Option<String> {
        self.pdf.map(|template| template.replace("{id}", id))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RecordType {
    pub key: &'static str,
    pub label: &'static str,
    pub endpoints: EndpointSet,
    pub fields: &'static [FieldSpec],
    pub pdf: PdfStrategy,
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }
}

pub fn find(key: &str) -> Option<RecordType> {
    let wanted = key.trim().to_lowercase();
    builtin().iter().find(|rt| rt.key == wanted).copied()
}

const fn plain(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind,
        role: FieldRole::Plain,
        rules: &[],
    }
}

const STUDENT_REF: FieldSpec = FieldSpec {
    name: "student_id",
    label: "Student",
    kind: FieldKind::Text,
    role: FieldRole::StudentRef,
    rules: &[Rule::Required],
};

const EVENT_DATE: FieldSpec = FieldSpec {
    name: "date",
    label: "Date",
    kind: FieldKind::Date,
    role: FieldRole::EventDate,
    rules: &[Rule::Required],
};

const GRADE_LEVEL: FieldSpec = FieldSpec {
    name: "grade_level",
    label: "Grade Level",
    kind: FieldKind::Derived,
    role: FieldRole::DerivedGrade,
    rules: &[],
};

const SECTION: FieldSpec = FieldSpec {
    name: "section",
    label: "Section",
    kind: FieldKind::Derived,
    role: FieldRole::DerivedSection,
    rules: &[],
};

const COUNSELOR_NAME: FieldSpec = FieldSpec {
    name: "counselor_name",
    label: "Counselor",
    kind: FieldKind::Derived,
    role: FieldRole::Author,
    rules: &[],
};

const CAREER_PLAN_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    plain("first_choice", "First Course Choice", FieldKind::Text),
    plain("second_choice", "Second Course Choice", FieldKind::Text),
    plain("third_choice", "Third Course Choice", FieldKind::Text),
    FieldSpec {
        name: "plans_after_graduation",
        label: "Plans After Graduation",
        kind: FieldKind::Choice(&["college", "employment", "vocational", "undecided"]),
        role: FieldRole::Plain,
        rules: &[],
    },
    plain("reason", "Reason", FieldKind::LongText),
    COUNSELOR_NAME,
];

const CONSENT_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    FieldSpec {
        name: "party_name",
        label: "Consenting Party",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required],
    },
    FieldSpec {
        name: "relationship",
        label: "Relationship",
        kind: FieldKind::Choice(&["parent", "guardian", "self"]),
        role: FieldRole::Plain,
        rules: &[],
    },
    plain("consent_given", "Consent Given", FieldKind::Flag),
    plain("remarks", "Remarks", FieldKind::LongText),
    COUNSELOR_NAME,
];

const EXIT_INTERVIEW_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    FieldSpec {
        name: "reason_for_leaving",
        label: "Reason For Leaving",
        kind: FieldKind::Choice(&["transfer", "graduation", "financial", "relocation", "other"]),
        role: FieldRole::Plain,
        rules: &[],
    },
    plain("destination_school", "Destination School", FieldKind::Text),
    plain("remarks", "Remarks", FieldKind::LongText),
    COUNSELOR_NAME,
];

const INVENTORY_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    plain("siblings", "Siblings", FieldKind::Rows(&["name", "age", "occupation"])),
    plain(
        "work_experience",
        "Work Experience",
        FieldKind::Rows(&["employer", "position", "years"]),
    ),
    plain("hobbies", "Hobbies", FieldKind::LongText),
    COUNSELOR_NAME,
];

const CUSTODY_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    FieldSpec {
        name: "document_title",
        label: "Document Title",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required],
    },
    plain("released_to", "Released To", FieldKind::Text),
    plain("returned", "Returned", FieldKind::Flag),
    plain("remarks", "Remarks", FieldKind::LongText),
    COUNSELOR_NAME,
];

const PASS_SLIP_FIELDS: &[FieldSpec] = &[
    STUDENT_REF,
    EVENT_DATE,
    GRADE_LEVEL,
    SECTION,
    plain("time_issued", "Time Issued", FieldKind::Text),
    FieldSpec {
        name: "reason",
        label: "Reason",
        kind: FieldKind::Choice(&["counseling", "clinic", "office", "dismissal", "other"]),
        role: FieldRole::Plain,
        rules: &[],
    },
    COUNSELOR_NAME,
];

const BUILTIN: &[RecordType] = &[
    RecordType {
        key: "career-plan",
        label: "Career Planning",
        endpoints: EndpointSet {
            collection: "/career-plans",
            pdf: Some("/career-plans/{id}/pdf"),
        },
        fields: CAREER_PLAN_FIELDS,
        pdf: PdfStrategy::ServerRendered,
    },
    RecordType {
        key: "consent",
        label: "Consent",
        endpoints: EndpointSet {
            collection: "/consents",
            pdf: Some("/consents/{id}/pdf"),
        },
        fields: CONSENT_FIELDS,
        pdf: PdfStrategy::ServerRendered,
    },
    RecordType {
        key: "exit-interview",
        label: "Exit Interview",
        endpoints: EndpointSet {
            collection: "/exit-interviews",
            pdf: Some("/exit-interviews/{id}/pdf"),
        },
        fields: EXIT_INTERVIEW_FIELDS,
        pdf: PdfStrategy::ServerRendered,
    },
    RecordType {
        key: "inventory",
        label: "Individual Inventory",
        endpoints: EndpointSet {
            collection: "/inventories",
            pdf: Some("/inventories/{id}/pdf"),
        },
        fields: INVENTORY_FIELDS,
        pdf: PdfStrategy::ServerRendered,
    },
    RecordType {
        key: "custody",
        label: "Endorsement Custody",
        endpoints: EndpointSet {
            collection: "/custody-entries",
            pdf: None,
        },
        fields: CUSTODY_FIELDS,
        pdf: PdfStrategy::ClientComposed,
    },
    RecordType {
        key: "pass-slip",
        label: "Guidance Pass Slip",
        endpoints: EndpointSet {
            collection: "/pass-slips",
            pdf: None,
        },
        fields: PASS_SLIP_FIELDS,
        pdf: PdfStrategy::ClientComposed,
    },
];

pub fn builtin() -> &'static [RecordType] {
    BUILTIN
}
