//! Exercises the whole boundary surface the way an emulation core uses it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bedrock_host::{
    ConfigEntry, FileMode, LinkHub, Platform, PlatformConfig, SaveOptions, TaskBox,
};
use bedrock_savestate::{Result as SavestateResult, StateSource, StateTarget};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct MiniCore {
    registers: [u32; 4],
    ram: Vec<u8>,
}

impl StateSource for MiniCore {
    fn export_state(&self, out: &mut Vec<u8>) -> SavestateResult<()> {
        for reg in self.registers {
            out.extend_from_slice(&reg.to_le_bytes());
        }
        out.extend_from_slice(&self.ram);
        Ok(())
    }
}

impl StateTarget for MiniCore {
    fn import_state(&mut self, payload: &[u8]) -> SavestateResult<()> {
        if payload.len() < 16 {
            return Err(bedrock_savestate::SavestateError::Truncated);
        }
        let (regs, ram) = payload.split_at(16);
        for (i, chunk) in regs.chunks_exact(4).enumerate() {
            self.registers[i] = u32::from_le_bytes(chunk.try_into().expect("4 bytes"));
        }
        self.ram = ram.to_vec();
        Ok(())
    }
}

#[test]
fn thread_scenario_from_the_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig::standalone(dir.path()));

    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    let thread = platform
        .spawn_thread(TaskBox::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .expect("spawn");

    platform.sync().thread_wait(thread).expect("wait");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    platform.sync().thread_free(thread).expect("first free");
    assert!(platform.sync().thread_free(thread).is_err(), "double free");
}

#[test]
fn local_files_are_namespaced_per_instance() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut cfg1 = PlatformConfig::standalone(dir.path());
    cfg1.instance_id = 1;
    let p1 = Platform::new(cfg1);

    let mut cfg2 = PlatformConfig::standalone(dir.path());
    cfg2.instance_id = 2;
    let p2 = Platform::new(cfg2);

    let mut f1 = p1.open_local_file("x", FileMode::Write).expect("open 1");
    let mut f2 = p2.open_local_file("x", FileMode::Write).expect("open 2");
    assert_ne!(f1.path(), f2.path());
    f1.write_all(b"one").expect("write 1");
    f2.write_all(b"two").expect("write 2");
    f1.close().expect("close 1");
    f2.close().expect("close 2");

    assert!(p1.local_file_exists("x"));
    assert!(!p1.file_exists("x"), "global namespace stays clean");
}

#[test]
fn no_create_probe_does_not_fabricate_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig::standalone(dir.path()));

    assert!(platform.open_file("ghost.bin", FileMode::NoCreate).is_err());
    assert!(!platform.file_exists("ghost.bin"));
}

#[test]
fn savestate_round_trip_through_the_boundary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig::standalone(dir.path()));

    let mut core = MiniCore {
        registers: [1, 2, 3, 4],
        ram: vec![0x42; 1024],
    };
    let bytes = platform.write_savestate(&core);
    assert!(!bytes.is_empty());

    core.registers = [9, 9, 9, 9];
    core.ram.fill(0);
    assert!(platform.read_savestate(&mut core, &bytes));
    assert_eq!(core.registers, [1, 2, 3, 4]);
    assert!(core.ram.iter().all(|&b| b == 0x42));

    // A corrupt buffer fails and leaves the restored state alone.
    let before = core.clone();
    let mut bad = bytes.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0x80;
    assert!(!platform.read_savestate(&mut core, &bad));
    assert_eq!(core, before);
}

#[test]
fn rebind_moves_local_namespace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut platform = Platform::new(PlatformConfig::standalone(dir.path()));
    assert_eq!(platform.instance_file_suffix(), "");

    platform.rebind_instance(4);
    assert_eq!(platform.instance_id(), 4);
    assert_eq!(platform.instance_file_suffix(), ".4");

    let f = platform
        .open_local_file("save.bin", FileMode::Write)
        .expect("open");
    assert!(f.path().to_string_lossy().ends_with("save.bin.4"));
    f.close().expect("close");
}

#[test]
fn config_lookups_are_typed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig::standalone(dir.path()));

    assert!(platform.get_config_bool(ConfigEntry::MultiplayerAllowed));
    assert_eq!(platform.get_config_int(ConfigEntry::FirmwareLanguage), 1);
    assert_eq!(platform.get_config_string(ConfigEntry::Bios9Path), "");
}

#[test]
fn linked_platforms_exchange_lockstep_traffic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let hub = LinkHub::new(Some(Duration::from_millis(200)));

    let mut host_cfg = PlatformConfig::standalone(dir.path());
    host_cfg.mp_hub = Some(hub.clone());
    let host = Platform::new(host_cfg);

    let mut peer_cfg = PlatformConfig::standalone(dir.path());
    peer_cfg.instance_id = 1;
    peer_cfg.mp_hub = Some(hub.clone());
    let peer = Platform::new(peer_cfg);

    assert!(host.mp().is_host());
    let peer_aid = peer.mp().aid().expect("attached");

    host.mp().begin();
    peer.mp().begin();

    host.mp().send_cmd(b"sync", 10);
    let (cmd, ts) = peer.mp().recv_host_packet().expect("cmd");
    assert_eq!((cmd.as_slice(), ts), (&b"sync"[..], 10));
    peer.mp().send_reply(b"ok", ts, peer_aid);

    let slots = host.mp().recv_replies(ts, 1 << peer_aid);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].data.as_deref(), Some(&b"ok"[..]));

    host.mp().end();
    peer.mp().end();
}

#[test]
fn platform_without_transports_degrades_silently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig {
        savestate: SaveOptions { compress: false },
        ..PlatformConfig::standalone(dir.path())
    });

    assert!(!platform.mp().is_enabled());
    assert!(!platform.lan().is_enabled());
    assert_eq!(platform.mp().send_cmd(b"cmd", 1), 0);
    assert_eq!(platform.lan().send_packet(b"dgram"), 0);
    assert_eq!(platform.lan().recv_packet(), None);
}

#[test]
fn cartridge_parse_is_reachable_from_the_facade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = Platform::new(PlatformConfig::standalone(dir.path()));

    // Minimal valid header: correct CRC over the first 0x15E bytes.
    let mut rom = vec![0u8; 0x160];
    rom[0x0C..0x10].copy_from_slice(b"TEST");
    let crc = bedrock_cart::crc16(&rom[..0x15E]);
    rom[0x15E..0x160].copy_from_slice(&crc.to_le_bytes());

    let save = vec![0xEE; 32];
    let image = platform
        .parse_rom_with_save(&rom, Some(&save))
        .expect("parse");
    assert_eq!(image.save_data(), &save[..]);

    rom[0x00] ^= 0xFF;
    assert!(platform.parse_rom_with_save(&rom, None).is_err());
}
