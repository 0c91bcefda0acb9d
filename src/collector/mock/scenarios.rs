//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` and `/sys` states for testing
//! the collectors under various host conditions.

use super::filesystem::MockFs;

const SOCKET_TABLE_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n";

impl MockFs {
    /// Creates a typical two-socket server.
    ///
    /// Includes: `/proc/{stat,meminfo,cpuinfo,uptime}`, the current process
    /// (`/proc/self`), host name, DMI identity and a 100 GB root filesystem.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "12345.50 98765.43\n");
        fs.add_file("/proc/sys/kernel/hostname", "db-primary\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        // 2 packages x 2 cores x 2 hyperthreads
        let mut cpuinfo = String::new();
        for processor in 0..8 {
            let package = processor / 4;
            let core = (processor / 2) % 2;
            cpuinfo.push_str(&format!(
                "\
processor\t: {processor}
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 85
model name\t: Intel(R)  Xeon(R)  Gold- 6148 CPU @ 2.40GHz
stepping\t: 4
cpu MHz\t\t: 2400.000
cache size\t: 28160 KB
physical id\t: {package}
siblings\t: 4
core id\t\t: {core}
cpu cores\t: 2
flags\t\t: fpu vme de pse tsc msr pae mce
power management:

"
            ));
        }
        fs.add_file("/proc/cpuinfo", cpuinfo);

        fs.add_file(
            "/proc/self/stat",
            "4242 (hostprobe) S 1 4242 4242 0 -1 4194304 100 0 0 0 10 5 0 0 20 0 3 0 1200000 12345678 100 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0",
        );
        fs.add_file(
            "/proc/self/status",
            "Name:\thostprobe\nState:\tS (sleeping)\nPid:\t4242\nPPid:\t1\nThreads:\t3\n",
        );

        fs.add_file("/sys/class/dmi/id/bios_vendor", "American Megatrends Inc.\n");
        fs.add_file("/sys/class/dmi/id/bios_version", "  3.1a \n");
        fs.add_file("/sys/class/dmi/id/bios_date", "05/24/2019\n");
        fs.add_file("/sys/class/dmi/id/board_name", "X11DPi-N\n");
        fs.add_file("/sys/class/dmi/id/board_vendor", "Supermicro\n");
        fs.add_file("/sys/class/dmi/id/board_version", "1.10\n");
        fs.add_file("/sys/class/dmi/id/board_asset_tag", "Default string\n");
        // board_serial is root-only: left absent

        fs.set_fs_usage("/", 100_000_000_000, 40_000_000_000);

        fs
    }

    /// Typical host plus a handful of listening services.
    ///
    /// * tcp 8080 (pid 777, `socket:[12345]`)
    /// * udp 53 bound by pid 53 (state `07`, never reported as listening)
    /// * tcp6 22 owned by root: descriptors not visible
    /// * one established tcp connection on 3306
    pub fn listening_services() -> Self {
        let mut fs = Self::typical_host();

        fs.add_file(
            "/proc/net/tcp",
            format!(
                "{SOCKET_TABLE_HEADER}\
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 1 0000000000000000 100 0 0 10 0
   1: 0100007F:0CEA 0100007F:D3C2 01 00000000:00000000 00:00000000 00000000   999        0 67890 1 0000000000000000 20 4 30 10 -1
"
            ),
        );
        fs.add_file(
            "/proc/net/udp",
            format!(
                "{SOCKET_TABLE_HEADER}\
   0: 3500007F:0035 00000000:0000 07 00000000:00000000 00:00000000 00000000   101        0 2222 2 0000000000000000 0
"
            ),
        );
        fs.add_file(
            "/proc/net/tcp6",
            format!(
                "{SOCKET_TABLE_HEADER}\
   0: 00000000000000000000000000000000:0016 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 3333 1 0000000000000000 100 0 0 10 0
"
            ),
        );

        fs.add_process_fds(
            777,
            &[(0, "/dev/null"), (1, "pipe:[4021]"), (3, "socket:[12345]")],
        );
        fs.add_link("/proc/777/exe", "/usr/local/bin/api-server");
        fs.add_process_fds(999, &[(0, "/dev/null"), (12, "socket:[67890]")]);
        fs.add_process_fds(53, &[(4, "socket:[2222]")]);
        fs.add_dir("/proc/1");

        fs
    }
}
