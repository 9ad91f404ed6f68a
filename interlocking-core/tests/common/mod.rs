// Shared fixture for the integration tests: a small station TH71 with three routes,
// one switching machine, three track circuits and a short line of signals.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use interlocking_core::{
    Aspect, InterlockingObject, LockColumn, LockTableRow, ObjectId, ObjectKind, PlantData, RouteDefinition,
    SignalDefinition, SignalType, ThrowOutControl, Timestamp,
};

pub const PLANT: &str = "TH71";

pub const LEVER_1: ObjectId = 1;
pub const LEVER_2: ObjectId = 2;
pub const LEVER_3: ObjectId = 3;
pub const ROUTE_1: ObjectId = 10;
pub const ROUTE_2: ObjectId = 11;
pub const ROUTE_3: ObjectId = 12;
pub const ROUTE_4: ObjectId = 13;
pub const MACHINE: ObjectId = 20;
pub const TRACK_3: ObjectId = 30;
pub const TRACK_4: ObjectId = 31;
pub const TRACK_5: ObjectId = 32;

pub fn start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
}

pub fn four_aspect() -> SignalType {
    SignalType::new("4灯", [Aspect::Y, Aspect::Y, Aspect::YG, Aspect::G, Aspect::G])
}

/// Builder for master data of plant TH71
pub struct PlantBuilder {
    data: PlantData,
}

impl PlantBuilder {
    pub fn new() -> Self {
        Self {
            data: PlantData {
                signal_types: vec![four_aspect()],
                ..PlantData::default()
            },
        }
    }

    pub fn object(mut self, id: ObjectId, name: &str, kind: ObjectKind) -> Self {
        self.data.objects.push(InterlockingObject::new(id, name, kind, PLANT));
        self
    }

    /// Route object plus its definition
    pub fn route(mut self, id: ObjectId, name: &str, lever: ObjectId, button: &str) -> Self {
        self.data.objects.push(InterlockingObject::new(id, name, ObjectKind::Route, PLANT));
        self.data.routes.push(RouteDefinition::new(id, lever).with_button(button));
        self
    }

    /// Route object without a lever, set only by throw-out control
    pub fn lever_less_route(mut self, id: ObjectId, name: &str, button: &str) -> Self {
        self.data.objects.push(InterlockingObject::new(id, name, ObjectKind::Route, PLANT));
        self.data.routes.push(RouteDefinition::without_lever(id).with_button(button));
        self
    }

    pub fn throw_out_without_lever(mut self, source: ObjectId, target: ObjectId) -> Self {
        self.data.throw_out_controls.push(ThrowOutControl::new(source, target).without_lever());
        self
    }

    pub fn throw_out(mut self, source: ObjectId, target: ObjectId) -> Self {
        self.data.throw_out_controls.push(ThrowOutControl::new(source, target));
        self
    }

    pub fn lock(mut self, object: &str, column: LockColumn, raw: &str) -> Self {
        self.data.lock_table.push(LockTableRow::new(PLANT, object, column, raw));
        self
    }

    pub fn signal(mut self, signal: SignalDefinition) -> Self {
        self.data.signals.push(signal);
        self
    }

    pub fn build(self) -> PlantData {
        self.data
    }
}

/// Objects and signals of the standard station, without lock table or throw-out controls
pub fn station_objects() -> PlantBuilder {
    PlantBuilder::new()
        .object(LEVER_1, "TH71_1", ObjectKind::Lever)
        .object(LEVER_2, "TH71_2", ObjectKind::Lever)
        .object(LEVER_3, "TH71_3", ObjectKind::Lever)
        .route(ROUTE_1, "TH71_1RA", LEVER_1, "TH71_AP")
        .route(ROUTE_2, "TH71_2LB", LEVER_2, "TH71_BP")
        .route(ROUTE_3, "TH71_3RC", LEVER_3, "TH71_CP")
        .object(MACHINE, "TH71_W21", ObjectKind::SwitchingMachine)
        .object(TRACK_3, "TH71_3T", ObjectKind::TrackCircuit)
        .object(TRACK_4, "TH71_4T", ObjectKind::TrackCircuit)
        .object(TRACK_5, "TH71_5T", ObjectKind::TrackCircuit)
        .signal(
            SignalDefinition::new("TH71_1R", "4灯")
                .with_routes(vec![ROUTE_1])
                .with_track_circuit(TRACK_3)
                .with_next("TH71_3"),
        )
        .signal(SignalDefinition::new("TH71_3", "4灯").with_track_circuit(TRACK_4).with_next("TH71_5"))
        .signal(SignalDefinition::new("TH71_5", "4灯").with_track_circuit(TRACK_5))
}

/// The standard station with its interlocking table
///
/// - 1RA needs machine 21 reversed, is locked by 2LB and an occupied 3T, and clears over 4T
/// - 2LB is locked by 1RA and an occupied 5T, and clears over 5T
/// - 3RC needs machine 21 normal and is locked by 3T occupied for 30 seconds
pub fn station() -> PlantBuilder {
    station_objects()
        .lock("TH71_1RA", LockColumn::SwitchingMachine, "(21)")
        .lock("TH71_1RA", LockColumn::DirectLock, "2LB 3T")
        .lock("TH71_1RA", LockColumn::SignalControl, "4T")
        .lock("TH71_2LB", LockColumn::DirectLock, "1RA 5T")
        .lock("TH71_2LB", LockColumn::SignalControl, "5T")
        .lock("TH71_3RC", LockColumn::SwitchingMachine, "21")
        .lock("TH71_3RC", LockColumn::DirectLock, "3T但30秒")
}
