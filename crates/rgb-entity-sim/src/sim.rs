//! The tick loop: a view centre sweeps across a populated world while the
//! manager pages columns in and out of LMDB.

use std::fs::File;
use std::io::BufWriter;

use eyre::WrapErr;
use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rgb_entity::{ManagerStats, PersistentEntitySectionManager};
use rgb_spatial::{ChunkLoadLevel, ChunkPos, EntityAccess, RemovalReason, SECTION_SIZE, Vec3};
use rgb_storage::{LmdbConfig, LmdbEntityStorage};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::counters::Counters;
use crate::mob::{IdAllocator, Mob, MobCodec, MobKind};

type Manager = PersistentEntitySectionManager<Mob, LmdbEntityStorage<MobCodec>, Counters>;

/// Ticket level at the view centre; levels rise by one per column outside
/// the view distance.
const CENTRE_TICKET_LEVEL: u32 = 31;

/// Blocks the view centre advances along +x per tick.
const VIEW_SPEED: f64 = 0.5;

const STATS_INTERVAL: u32 = 100;

pub struct Simulation {
    config: SimConfig,
    manager: Manager,
    ids: IdAllocator,
    rng: StdRng,
    player: Mob,
    levels: HashMap<ChunkPos, ChunkLoadLevel>,
}

impl Simulation {
    pub fn open(config: SimConfig) -> eyre::Result<Self> {
        let ids = IdAllocator::default();
        let storage = LmdbEntityStorage::open(
            &LmdbConfig::at(&config.db_path),
            MobCodec::new(ids.clone()),
        )
        .wrap_err_with(|| format!("opening {}", config.db_path.display()))?;

        let player = Mob::new(
            ids.next(),
            Uuid::new_v4(),
            MobKind::Player,
            Vec3::new(0.0, 64.0, 0.0),
            20.0,
        );
        let mut manager = PersistentEntitySectionManager::new(storage, Counters::default());
        manager.add_new_entity(player.clone());

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            manager,
            ids,
            player,
            levels: HashMap::new(),
        })
    }

    /// Scatter the initial population over the area the view will cross.
    pub fn populate(&mut self) {
        let reach = f64::from(self.config.view_distance + 8) * f64::from(SECTION_SIZE);
        let mut batch = Vec::with_capacity(self.config.entities as usize);
        for _ in 0..self.config.entities {
            let position = Vec3::new(
                self.rng.gen_range(-reach..reach * 3.0),
                self.rng.gen_range(60.0..80.0),
                self.rng.gen_range(-reach..reach),
            );
            batch.push(self.spawn_at(position));
        }
        info!("populating world with {} mobs", batch.len());
        self.manager.add_world_gen_chunk_entities(batch);
    }

    fn spawn_at(&mut self, position: Vec3) -> Mob {
        let kind = match self.rng.gen_range(0..10) {
            0..=5 => MobKind::Sheep,
            6..=8 => MobKind::Zombie,
            _ => MobKind::Marker,
        };
        Mob::new(self.ids.next(), Uuid::new_v4(), kind, position, 10.0)
    }

    pub fn run(&mut self) {
        for tick in 1..=self.config.ticks {
            self.advance_view();
            self.manager.tick();
            self.wander();

            if tick % self.config.autosave_interval == 0 {
                self.manager.auto_save();
            }
            if tick % STATS_INTERVAL == 0 {
                info!(
                    "tick {tick}: {} | {}",
                    self.manager.stats(),
                    self.manager.callbacks()
                );
            }
        }
    }

    fn advance_view(&mut self) {
        self.player.move_by(VIEW_SPEED, 0.0);
        self.manager.on_move(&self.player);
        self.update_levels(ChunkPos::of(self.player.position()));
    }

    /// Recompute ticket levels around `centre` and report every column
    /// whose level changed.
    fn update_levels(&mut self, centre: ChunkPos) {
        let view = self.config.view_distance;
        let radius = i32::try_from(view + 2).unwrap_or(i32::MAX);

        let mut next = HashMap::new();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let column = ChunkPos::new(centre.x + dx, centre.z + dz);
                let distance = column.chessboard_distance(centre);
                let level = ChunkLoadLevel::from_ticket_level(
                    CENTRE_TICKET_LEVEL + distance.saturating_sub(view - 1),
                );
                if level != ChunkLoadLevel::Inaccessible {
                    next.insert(column, level);
                }
            }
        }

        for (column, level) in &next {
            if self.levels.get(column) != Some(level) {
                self.manager.update_chunk_status(*column, *level);
            }
        }
        for column in self.levels.keys() {
            if !next.contains_key(column) {
                self.manager
                    .update_chunk_status(*column, ChunkLoadLevel::Inaccessible);
            }
        }
        self.levels = next;
    }

    /// Move, kill and spawn mobs in ticking columns.
    fn wander(&mut self) {
        let ticking: Vec<Mob> = self
            .manager
            .entity_getter()
            .all()
            .filter(|mob| mob.kind() != MobKind::Player && mob.kind() != MobKind::Marker)
            .filter(|mob| self.manager.is_position_ticking(mob.position()))
            .cloned()
            .collect();

        for mob in &ticking {
            mob.move_by(self.rng.gen_range(-0.3..0.3), self.rng.gen_range(-0.3..0.3));
            self.manager.on_move(mob);

            if self.rng.gen_bool(0.0005) && mob.hurt(mob.health()) <= 0.0 {
                debug!("mob {} died at {:?}", mob.id(), mob.position());
                self.manager.remove_entity(mob, RemovalReason::Killed);
            }
        }

        if self.rng.gen_bool(0.2) {
            let around = self.player.position();
            let position = around.offset(
                self.rng.gen_range(-24.0..24.0),
                0.0,
                self.rng.gen_range(-24.0..24.0),
            );
            let mob = self.spawn_at(position);
            self.manager.add_new_entity(mob);
        }
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.manager.stats()
    }

    /// Write the section table next to the database.
    pub fn dump_sections(&self) -> eyre::Result<()> {
        let path = self.config.db_path.join("sections.csv");
        let mut out = BufWriter::new(File::create(&path)?);
        self.manager.dump_sections(&mut out)?;
        info!("wrote section dump to {}", path.display());
        Ok(())
    }

    /// Drop every ticket, save every column and shut storage down.
    pub fn close(mut self) -> eyre::Result<Counters> {
        for column in std::mem::take(&mut self.levels).into_keys() {
            self.manager
                .update_chunk_status(column, ChunkLoadLevel::Inaccessible);
        }
        self.manager
            .remove_entity(&self.player, RemovalReason::UnloadedWithPlayer);

        let counters = std::mem::take(self.manager.callbacks_mut());
        self.manager.close().wrap_err("closing entity storage")?;
        Ok(counters)
    }
}
